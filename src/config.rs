//! Encoding policy configuration.
//!
//! The policy is built once at startup and handed to every pipeline call by
//! reference; nothing mutates it afterwards. Values come from three layers,
//! later layers winning:
//!
//! 1. stock defaults (see [`stock_config_toml`])
//! 2. an optional sparse `config.toml`
//! 3. `UPLOAD_OPTIMIZER_<SECTION>__<KEY>` environment variables
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [policy]
//! max_width = 1920                 # Larger images are scaled down to fit
//! max_height = 1920
//! prefer_modern_container = true   # Re-encode stills as WebP
//! quality = 85                     # Lossy quality (1-100)
//! thumbnail_width = 300
//! thumbnail_height = 300
//! thumbnail_quality = 80           # Thumbnail JPEG quality (1-100)
//!
//! [processing]
//! max_workers = 4                  # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Environment variables map onto the same keys, for example
//! `UPLOAD_OPTIMIZER_POLICY__QUALITY=70`. Unknown keys are rejected to catch
//! typos early.

use crate::imaging::{Envelope, OptimizeSettings, Quality, ThumbnailConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "UPLOAD_OPTIMIZER_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid environment override {var}: {reason}")]
    Env { var: String, reason: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub policy: EncodingPolicy,
    pub processing: ProcessingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.policy.validate()?;
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// How uploads are sized and encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingPolicy {
    pub max_width: u32,
    pub max_height: u32,
    /// Re-encode non-animated images as WebP.
    pub prefer_modern_container: bool,
    /// Lossy quality for JPEG and WebP (1-100).
    pub quality: u32,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub thumbnail_quality: u32,
}

impl Default for EncodingPolicy {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            prefer_modern_container: true,
            quality: 85,
            thumbnail_width: 300,
            thumbnail_height: 300,
            thumbnail_quality: 80,
        }
    }
}

impl EncodingPolicy {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("max_width", self.max_width),
            ("max_height", self.max_height),
            ("thumbnail_width", self.thumbnail_width),
            ("thumbnail_height", self.thumbnail_height),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "policy.{key} must be non-zero"
                )));
            }
        }
        for (key, value) in [
            ("quality", self.quality),
            ("thumbnail_quality", self.thumbnail_quality),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "policy.{key} must be 1-100"
                )));
            }
        }
        Ok(())
    }

    pub fn bound(&self) -> Envelope {
        Envelope::new(self.max_width, self.max_height)
    }

    pub fn thumbnail_bound(&self) -> Envelope {
        Envelope::new(self.thumbnail_width, self.thumbnail_height)
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    pub fn thumbnail_quality(&self) -> Quality {
        Quality::new(self.thumbnail_quality)
    }

    pub fn optimize_settings(&self) -> OptimizeSettings {
        OptimizeSettings {
            bound: self.bound(),
            prefer_modern: self.prefer_modern_container,
            quality: self.quality(),
        }
    }

    pub fn thumbnail_config(&self) -> ThumbnailConfig {
        ThumbnailConfig {
            bound: self.thumbnail_bound(),
            quality: self.thumbnail_quality(),
        }
    }
}

/// Parallel processing settings for the CLI host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Turn `UPLOAD_OPTIMIZER_*` variables into a sparse TOML overlay.
///
/// `UPLOAD_OPTIMIZER_POLICY__MAX_WIDTH=1024` becomes `policy.max_width = 1024`.
/// Values are read as TOML literals (so `true` and `85` keep their types);
/// anything that does not parse is taken as a string. Unrelated variables
/// are ignored.
pub fn env_overlay<I, K, V>(vars: I) -> Result<Option<toml::Value>, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut root = toml::Table::new();
    for (var, raw) in vars {
        let var = var.as_ref();
        let Some(path) = var.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let keys: Vec<String> = path.split("__").map(|k| k.to_ascii_lowercase()).collect();
        if keys.iter().any(|k| k.is_empty()) {
            return Err(ConfigError::Env {
                var: var.to_string(),
                reason: "expected UPLOAD_OPTIMIZER_<SECTION>__<KEY>".into(),
            });
        }
        let value = parse_env_value(raw.as_ref());

        let (leaf, sections) = keys.split_last().ok_or_else(|| ConfigError::Env {
            var: var.to_string(),
            reason: "empty key".into(),
        })?;
        let mut table = &mut root;
        for section in sections {
            let entry = table
                .entry(section.clone())
                .or_insert(toml::Value::Table(toml::Table::new()));
            table = match entry {
                toml::Value::Table(t) => t,
                _ => {
                    return Err(ConfigError::Env {
                        var: var.to_string(),
                        reason: format!("`{section}` is not a section"),
                    });
                }
            };
        }
        table.insert(leaf.clone(), value);
    }
    Ok((!root.is_empty()).then_some(toml::Value::Table(root)))
}

fn parse_env_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

/// Merge optional overlays onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = Option<toml::Value>>,
) -> Result<Config, ConfigError> {
    let merged = overlays.into_iter().flatten().fold(base, merge_toml);
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config: stock defaults, then `path` if given, then the
/// process environment.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with_env(path, std::env::vars())
}

/// [`load_config`] with an explicit set of environment variables.
pub fn load_config_with_env<I, K, V>(path: Option<&Path>, vars: I) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let base = stock_defaults_value()?;
    let file = path.map(load_raw_config).transpose()?;
    let env = env_overlay(vars)?;
    resolve_config(base, [file, env])
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Upload Optimizer Configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Every key can also be set from the environment as
# UPLOAD_OPTIMIZER_<SECTION>__<KEY>, e.g. UPLOAD_OPTIMIZER_POLICY__QUALITY=70.
# Environment values win over this file.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Encoding policy
# ---------------------------------------------------------------------------
[policy]
# Images larger than this box on either edge are scaled down to fit,
# keeping their aspect ratio. Smaller images are never enlarged.
max_width = 1920
max_height = 1920

# Re-encode non-animated images as WebP (renamed to .webp).
# When false, each format is re-encoded into itself; HEIC becomes JPEG.
prefer_modern_container = true

# Lossy encoding quality for JPEG and WebP (1 = worst, 100 = best).
quality = 85

# Thumbnails fit inside this box and are always JPEG.
thumbnail_width = 300
thumbnail_height = 300
thumbnail_quality = 80

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for the command-line tool.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_workers = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NO_ENV: [(&str, &str); 0] = [];

    #[test]
    fn default_policy_values() {
        let policy = EncodingPolicy::default();
        assert_eq!(policy.bound(), Envelope::new(1920, 1920));
        assert!(policy.prefer_modern_container);
        assert_eq!(policy.quality().value(), 85);
        assert_eq!(policy.thumbnail_bound(), Envelope::new(300, 300));
        assert_eq!(policy.thumbnail_quality().value(), 80);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[policy]
quality = 70
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.policy.quality, 70);
        // Default values preserved
        assert_eq!(config.policy.max_width, 1920);
        assert_eq!(config.processing.max_workers, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
[policy]
qualty = 70
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn stock_config_matches_defaults() {
        let parsed: Config = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    // =========================================================================
    // validation
    // =========================================================================

    #[test]
    fn validate_rejects_out_of_range_quality() {
        let policy = EncodingPolicy {
            quality: 0,
            ..EncodingPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(ConfigError::Validation(_))));

        let policy = EncodingPolicy {
            thumbnail_quality: 101,
            ..EncodingPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_zero_bounds() {
        let policy = EncodingPolicy {
            max_height: 0,
            ..EncodingPolicy::default()
        };
        let err = policy.validate().unwrap_err();
        assert!(err.to_string().contains("max_height"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let config = Config {
            processing: ProcessingConfig {
                max_workers: Some(0),
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_overrides_leaf_and_keeps_siblings() {
        let base: toml::Value = toml::from_str("[policy]\nquality = 85\nmax_width = 1920").unwrap();
        let overlay: toml::Value = toml::from_str("[policy]\nquality = 60").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["policy"]["quality"].as_integer(), Some(60));
        assert_eq!(merged["policy"]["max_width"].as_integer(), Some(1920));
    }

    // =========================================================================
    // environment overrides
    // =========================================================================

    #[test]
    fn env_overlay_maps_sections_and_types() {
        let overlay = env_overlay([
            ("UPLOAD_OPTIMIZER_POLICY__MAX_WIDTH", "1024"),
            ("UPLOAD_OPTIMIZER_POLICY__PREFER_MODERN_CONTAINER", "false"),
            ("UPLOAD_OPTIMIZER_PROCESSING__MAX_WORKERS", "2"),
            ("PATH", "/usr/bin"),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(overlay["policy"]["max_width"].as_integer(), Some(1024));
        assert_eq!(
            overlay["policy"]["prefer_modern_container"].as_bool(),
            Some(false)
        );
        assert_eq!(overlay["processing"]["max_workers"].as_integer(), Some(2));
    }

    #[test]
    fn env_overlay_ignores_unrelated_vars() {
        assert!(env_overlay([("HOME", "/root")]).unwrap().is_none());
    }

    #[test]
    fn env_overlay_rejects_malformed_names() {
        let result = env_overlay([("UPLOAD_OPTIMIZER_POLICY____QUALITY", "1")]);
        assert!(matches!(result, Err(ConfigError::Env { .. })));
    }

    #[test]
    fn env_unparsable_value_fails_deserialization() {
        let result = load_config_with_env(None, [("UPLOAD_OPTIMIZER_POLICY__QUALITY", "high")]);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_defaults_without_file() {
        let config = load_config_with_env(None, NO_ENV).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[policy]\nprefer_modern_container = false\nquality = 90\n").unwrap();

        let config = load_config_with_env(Some(&path), NO_ENV).unwrap();
        assert!(!config.policy.prefer_modern_container);
        assert_eq!(config.policy.quality, 90);
        assert_eq!(config.policy.max_width, 1920);
    }

    #[test]
    fn env_wins_over_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[policy]\nquality = 90\n").unwrap();

        let config =
            load_config_with_env(Some(&path), [("UPLOAD_OPTIMIZER_POLICY__QUALITY", "40")]).unwrap();
        assert_eq!(config.policy.quality, 40);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config_with_env(Some(&tmp.path().join("nope.toml")), NO_ENV);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config_with_env(Some(&path), NO_ENV);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_merged_result() {
        let result = load_config_with_env(None, [("UPLOAD_OPTIMIZER_POLICY__QUALITY", "0")]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_workers: Some(cores + 10)
            }),
            cores
        );
        assert_eq!(
            effective_threads(&ProcessingConfig {
                max_workers: Some(1)
            }),
            1
        );
    }
}
