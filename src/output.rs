//! CLI output formatting.
//!
//! # Output Format
//!
//! One block per input file, leading with the source name. Files that were
//! re-encoded show the artifact name with `→`, then size and thumbnail as
//! indented context:
//!
//! ```text
//! 001 holiday.jpg → holiday.webp (webp, 1920x1440, resized)
//!     Size: 4.2 MB → 312.5 KB (-93%)
//!     Thumbnail: holiday_thumb.jpg
//! 002 loop.gif: kept (320x240)
//! 003 notes.txt: kept (not an image)
//! 004 missing.png: error: No such file or directory (os error 2)
//!
//! Optimized 1 of 4 files, saved 3.9 MB
//! ```
//!
//! # Architecture
//!
//! `format_*` functions return lines for testability; `print_*` wrappers
//! write to stdout. Format functions are pure: no I/O, no side effects.
//! With `--json` the CLI serializes [`FileReport`]s instead.
//!
//! [`OutputDir`] is the only part that touches the filesystem. It refuses to
//! write the same name twice in one run, so two inputs that map to one
//! artifact name (`a/x.jpg` and `b/x.jpg`, or `x.jpg` and `x.png` under the
//! WebP policy) are reported instead of silently overwriting each other.

use crate::asset::{ProcessingOutcome, SourceAsset};
use crate::imaging::OutputFormat;
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Destination directory for one run. Safe to share across workers.
#[derive(Debug)]
pub struct OutputDir {
    dir: PathBuf,
    claimed: Mutex<HashSet<String>>,
}

impl OutputDir {
    /// Create the directory if needed.
    pub fn create(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            claimed: Mutex::new(HashSet::new()),
        })
    }

    /// Write `asset` under its own name. Fails with `AlreadyExists` when an
    /// earlier write in this run used the same name.
    pub fn write(&self, asset: &mut SourceAsset) -> io::Result<PathBuf> {
        let name = asset.name().to_string();
        let fresh = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.clone());
        if !fresh {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{name} was already written by another input"),
            ));
        }
        let path = self.dir.join(&name);
        std::fs::write(&path, asset.read_to_vec()?)?;
        Ok(path)
    }
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// A new encoding was written.
    Optimized,
    /// The input was kept byte-for-byte.
    Kept,
    /// The host could not read the input or write the artifact.
    Error { message: String },
}

/// Per-file result, printed as text or serialized as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source: String,
    pub artifact: String,
    #[serde(flatten)]
    pub status: FileStatus,
    pub format: Option<OutputFormat>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub original_size: u64,
    pub file_size: u64,
    pub was_resized: bool,
    pub thumbnail: Option<String>,
}

impl FileReport {
    pub fn from_outcome(
        source: &str,
        original_size: u64,
        outcome: &ProcessingOutcome,
        thumbnail: Option<String>,
    ) -> Self {
        Self {
            source: source.to_string(),
            artifact: outcome.artifact.name().to_string(),
            status: if outcome.is_passthrough() {
                FileStatus::Kept
            } else {
                FileStatus::Optimized
            },
            format: outcome.encoded,
            width: outcome.width,
            height: outcome.height,
            original_size,
            file_size: outcome.file_size,
            was_resized: outcome.was_resized,
            thumbnail,
        }
    }

    pub fn error(source: &str, message: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            artifact: source.to_string(),
            status: FileStatus::Error {
                message: message.into(),
            },
            format: None,
            width: None,
            height: None,
            original_size: 0,
            file_size: 0,
            was_resized: false,
            thumbnail: None,
        }
    }

    /// Bytes saved by the artifact; zero when nothing was gained.
    pub fn saved_bytes(&self) -> u64 {
        match self.status {
            FileStatus::Optimized => self.original_size.saturating_sub(self.file_size),
            _ => 0,
        }
    }
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `4.2 MB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn dimensions(report: &FileReport) -> Option<String> {
    report
        .width
        .zip(report.height)
        .map(|(w, h)| format!("{w}x{h}"))
}

fn format_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Jpeg => "jpeg",
        OutputFormat::Png => "png",
        OutputFormat::Gif => "gif",
        OutputFormat::WebP => "webp",
    }
}

/// Format one file's result as display lines.
pub fn format_report(index: usize, report: &FileReport) -> Vec<String> {
    let header = format!("{index:03} {}", report.source);
    match &report.status {
        FileStatus::Error { message } => vec![format!("{header}: error: {message}")],
        FileStatus::Kept => {
            let detail = dimensions(report).unwrap_or_else(|| "not an image".to_string());
            let mut lines = vec![format!("{header}: kept ({detail})")];
            if let Some(thumb) = &report.thumbnail {
                lines.push(format!("    Thumbnail: {thumb}"));
            }
            lines
        }
        FileStatus::Optimized => {
            let mut details: Vec<String> = Vec::new();
            if let Some(format) = report.format {
                details.push(format_name(format).to_string());
            }
            details.extend(dimensions(report));
            if report.was_resized {
                details.push("resized".to_string());
            }

            let mut lines = vec![format!(
                "{header} \u{2192} {} ({})",
                report.artifact,
                details.join(", ")
            )];
            let change = if report.original_size > 0 {
                let pct = (report.file_size as f64 / report.original_size as f64 - 1.0) * 100.0;
                format!(" ({pct:+.0}%)")
            } else {
                String::new()
            };
            lines.push(format!(
                "    Size: {} \u{2192} {}{change}",
                human_size(report.original_size),
                human_size(report.file_size)
            ));
            if let Some(thumb) = &report.thumbnail {
                lines.push(format!("    Thumbnail: {thumb}"));
            }
            lines
        }
    }
}

/// One-line run summary.
pub fn format_summary(reports: &[FileReport]) -> String {
    let optimized = reports
        .iter()
        .filter(|r| r.status == FileStatus::Optimized)
        .count();
    let saved: u64 = reports.iter().map(FileReport::saved_bytes).sum();
    let errors = reports
        .iter()
        .filter(|r| matches!(r.status, FileStatus::Error { .. }))
        .count();

    let mut summary = format!(
        "Optimized {optimized} of {} files, saved {}",
        reports.len(),
        human_size(saved)
    );
    if errors > 0 {
        summary.push_str(&format!(", {errors} failed"));
    }
    summary
}

pub fn print_reports(reports: &[FileReport]) {
    for (i, report) in reports.iter().enumerate() {
        for line in format_report(i + 1, report) {
            println!("{line}");
        }
    }
    println!();
    println!("{}", format_summary(reports));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimized_report() -> FileReport {
        FileReport {
            source: "holiday.jpg".into(),
            artifact: "holiday.webp".into(),
            status: FileStatus::Optimized,
            format: Some(OutputFormat::WebP),
            width: Some(1920),
            height: Some(1440),
            original_size: 4_000_000,
            file_size: 1_000_000,
            was_resized: true,
            thumbnail: Some("holiday_thumb.jpg".into()),
        }
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn format_optimized_file() {
        let lines = format_report(1, &optimized_report());
        assert_eq!(
            lines[0],
            "001 holiday.jpg \u{2192} holiday.webp (webp, 1920x1440, resized)"
        );
        assert_eq!(lines[1], "    Size: 3.8 MB \u{2192} 976.6 KB (-75%)");
        assert_eq!(lines[2], "    Thumbnail: holiday_thumb.jpg");
    }

    #[test]
    fn format_kept_file() {
        let report = FileReport {
            status: FileStatus::Kept,
            artifact: "loop.gif".into(),
            source: "loop.gif".into(),
            format: None,
            width: Some(320),
            height: Some(240),
            was_resized: false,
            thumbnail: None,
            ..optimized_report()
        };
        assert_eq!(format_report(2, &report), vec!["002 loop.gif: kept (320x240)"]);
    }

    #[test]
    fn format_non_image() {
        let outcome = ProcessingOutcome::passthrough(SourceAsset::from_bytes("notes.txt", vec![0; 10]));
        let report = FileReport::from_outcome("notes.txt", 10, &outcome, None);
        assert_eq!(report.status, FileStatus::Kept);
        assert_eq!(format_report(3, &report), vec!["003 notes.txt: kept (not an image)"]);
    }

    #[test]
    fn format_error() {
        let report = FileReport::error("missing.png", "not found");
        assert_eq!(format_report(4, &report), vec!["004 missing.png: error: not found"]);
    }

    #[test]
    fn summary_counts_and_savings() {
        let reports = vec![
            optimized_report(),
            FileReport::error("x.png", "boom"),
            FileReport::from_outcome(
                "a.txt",
                5,
                &ProcessingOutcome::passthrough(SourceAsset::from_bytes("a.txt", vec![0; 5])),
                None,
            ),
        ];
        assert_eq!(
            format_summary(&reports),
            "Optimized 1 of 3 files, saved 2.9 MB, 1 failed"
        );
    }

    #[test]
    fn json_flattens_status() {
        let json = serde_json::to_value(optimized_report()).unwrap();
        assert_eq!(json["status"], "optimized");
        assert_eq!(json["format"], "webp");
        assert_eq!(json["width"], 1920);

        let json = serde_json::to_value(FileReport::error("x", "boom")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "boom");
    }

    // =========================================================================
    // OutputDir
    // =========================================================================

    #[test]
    fn output_dir_refuses_a_second_write_under_one_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = OutputDir::create(&tmp.path().join("out")).unwrap();

        let mut first = SourceAsset::from_bytes("x.webp", b"first".to_vec());
        let path = out.write(&mut first).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        let mut second = SourceAsset::from_bytes("x.webp", b"second".to_vec());
        let err = out.write(&mut second).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        let mut thumb = SourceAsset::from_bytes("x_thumb.jpg", b"thumb".to_vec());
        assert!(out.write(&mut thumb).is_ok());
    }
}
