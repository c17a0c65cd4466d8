use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use upload_optimizer::asset::SourceAsset;
use upload_optimizer::output::{self, FileReport, OutputDir};
use upload_optimizer::pipeline::Optimizer;
use upload_optimizer::{config, imaging};

#[derive(Parser)]
#[command(name = "upload-optimizer")]
#[command(about = "Resize, re-encode and thumbnail uploaded images, safely")]
#[command(long_about = "\
Resize, re-encode and thumbnail uploaded images, safely

Every input is classified by extension. Supported images are scaled down to
fit the configured box, re-encoded (WebP by default) and written to the
output directory. Anything that is not an image, or fails to decode, is
copied through byte-for-byte: an optimization failure never loses a file.

Decision table for still images:
  prefer_modern_container = true   any format -> .webp
  prefer_modern_container = false  jpeg -> jpeg, png -> png, gif -> gif,
                                   webp -> webp, heic -> .jpg
Animated GIF, WebP and PNG files are always kept as they are.

Configuration is read from --config (TOML), then UPLOAD_OPTIMIZER_*
environment variables. Log verbosity follows RUST_LOG (default: info).

Run 'upload-optimizer gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct OptimizeArgs {
    /// Files to optimize
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Where artifacts (and thumbnails) are written
    #[arg(long, default_value = "optimized")]
    out_dir: PathBuf,

    /// Also write a `{stem}_thumb.jpg` for each still image
    #[arg(long)]
    thumbnails: bool,

    /// Print results as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize files into an output directory
    Optimize(OptimizeArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
    /// Load and validate the effective config, then print it
    CheckConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Optimize(args) => {
            let config = config::load_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            let out = OutputDir::create(&args.out_dir)?;

            let optimizer = Optimizer::new(config.policy);
            let reports: Vec<FileReport> = args
                .files
                .par_iter()
                .map(|path| optimize_file(&optimizer, path, &out, args.thumbnails))
                .collect();

            if args.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                output::print_reports(&reports);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::CheckConfig => {
            let config = config::load_config(cli.config.as_deref())?;
            println!("==> Config is valid");
            println!(
                "Supported extensions: {}",
                imaging::supported_extensions().join(", ")
            );
            println!();
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Log to stderr so `--json` output on stdout stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn optimize_file(
    optimizer: &Optimizer,
    path: &Path,
    out: &OutputDir,
    thumbnails: bool,
) -> FileReport {
    let source = path.display().to_string();
    match write_optimized(optimizer, path, &source, out, thumbnails) {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(file = %source, error = %err, "could not optimize file");
            FileReport::error(&source, err.to_string())
        }
    }
}

fn write_optimized(
    optimizer: &Optimizer,
    path: &Path,
    source: &str,
    out: &OutputDir,
    thumbnails: bool,
) -> std::io::Result<FileReport> {
    let mut asset = SourceAsset::open(path)?;
    let original_size = asset.size();

    let thumbnail = match thumbnails.then(|| optimizer.thumbnail(&mut asset)).flatten() {
        Some(mut thumb) => {
            out.write(&mut thumb)?;
            Some(thumb.name().to_string())
        }
        None => None,
    };

    let outcome = optimizer.process(asset);
    let report = FileReport::from_outcome(source, original_size, &outcome, thumbnail);
    let mut artifact = outcome.artifact;
    out.write(&mut artifact)?;
    Ok(report)
}
