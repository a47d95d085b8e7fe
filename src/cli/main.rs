//! Card matte CLI tool
//!
//! Command-line interface for running matte strategies over a set of card assets.

use super::config::{CliConfigBuilder, MatteJob};
use crate::{
    batch::{AssetOutcome, BatchReport, BatchRunner},
    config::StrategyKind,
    services::{ConsoleProgressReporter, ProgressReporter},
    tracing_config::{spans, TracingConfig, TracingFormat, TracingGuard},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::PathBuf;

/// Card art alpha-matte tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "card-matte")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Asset keys (file stems) to process [default: the manifest's assets]
    #[arg(value_name = "KEY")]
    pub keys: Vec<String>,

    /// JSON asset manifest
    #[arg(short, long, value_name = "FILE", required_unless_present = "assets_dir")]
    pub manifest: Option<PathBuf>,

    /// Asset directory, used instead of a manifest
    #[arg(short = 'd', long, value_name = "DIR", conflicts_with = "manifest")]
    pub assets_dir: Option<PathBuf>,

    /// Asset file extension [default: png]
    #[arg(long)]
    pub extension: Option<String>,

    /// Matte strategy [default: pixel, or the manifest's strategy]
    #[arg(short, long, value_enum)]
    pub strategy: Option<CliStrategy>,

    /// Brightness above which a pixel is background (0-255) [default: 240]
    #[arg(short, long)]
    pub threshold: Option<u8>,

    /// Morphological closing iterations [default: 2]
    #[arg(long)]
    pub close_iterations: Option<u32>,

    /// Morphological opening iterations [default: 1]
    #[arg(long)]
    pub open_iterations: Option<u32>,

    /// Side of the square structuring element, odd [default: 3]
    #[arg(long)]
    pub kernel_size: Option<u32>,

    /// Backup suffix (`<key>_<tag>.<ext>`) [default: depends on strategy]
    #[arg(long)]
    pub backup_tag: Option<String>,

    /// Read the pristine backup instead of the current file
    #[arg(long, overrides_with = "no_pristine")]
    pub pristine: bool,

    /// Read the current file even if the strategy prefers the backup
    #[arg(long, overrides_with = "pristine")]
    pub no_pristine: bool,

    /// External segmenter command with {input} and {output} placeholders
    #[arg(long, value_name = "COMMAND")]
    pub segmenter_command: Option<String>,

    /// Run every step except creating backups and writing results
    #[arg(long)]
    pub dry_run: bool,

    /// Show each asset's state relative to the backup tag and exit
    #[arg(long, conflicts_with_all = ["restore", "dry_run"])]
    pub status: bool,

    /// Copy each asset's backup over its current file and exit
    #[arg(long, conflicts_with = "dry_run")]
    pub restore: bool,

    /// Write the batch report as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Show a progress bar instead of per-asset log lines
    #[arg(long)]
    pub progress: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliStrategy {
    /// Per-pixel RGB threshold
    #[value(alias = "pixel-threshold", alias = "threshold")]
    Pixel,
    /// Luma threshold with closing and opening
    #[value(alias = "morphological-threshold", alias = "opencv")]
    Morphological,
    /// External segmentation program (rembg by default)
    #[value(alias = "external-segmentation", alias = "rembg")]
    External,
}

impl From<CliStrategy> for StrategyKind {
    fn from(strategy: CliStrategy) -> Self {
        match strategy {
            CliStrategy::Pixel => StrategyKind::PixelThreshold,
            CliStrategy::Morphological => StrategyKind::MorphologicalThreshold,
            CliStrategy::External => StrategyKind::ExternalSegmentation,
        }
    }
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose).context("Failed to initialize tracing")?;

    let job = CliConfigBuilder::from_cli(&cli).context("Invalid configuration")?;
    let session_id = uuid::Uuid::new_v4().to_string();
    let _session = spans::session(&session_id, &job.descriptor.kind.to_string()).entered();

    if cli.status {
        return show_status(&job);
    }
    if cli.restore {
        return restore_assets(&job);
    }

    let report = run_batch(&cli, job)?;
    print_summary(&report);

    if let Some(path) = &cli.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if !report.is_success() {
        anyhow::bail!(
            "{} of {} assets failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn init_tracing(verbose_count: u8) -> Result<TracingGuard> {
    let mut config = TracingConfig::new()
        .with_verbosity(verbose_count)
        .with_format(TracingFormat::Console);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        config = config.with_env_filter(filter);
    }
    config.init()
}

fn run_batch(cli: &Cli, job: MatteJob) -> Result<BatchReport> {
    let factory = CliConfigBuilder::strategy_factory(&job)
        .context("Failed to set up the segmentation service")?;

    info!(
        "Strategy: {} (backup tag '{}', pristine source: {})",
        job.descriptor.kind, job.descriptor.backup_tag, job.descriptor.requires_pristine_source
    );
    info!(
        "Assets: {} in {}",
        job.keys.len(),
        job.store.root().display()
    );

    let reporter: Box<dyn ProgressReporter> = if cli.progress {
        Box::new(BarProgressReporter::new(job.keys.len()))
    } else {
        Box::new(ConsoleProgressReporter::new(cli.verbose > 0))
    };

    let runner = BatchRunner::new(job.store, Box::new(factory), job.matte)
        .with_reporter(reporter)
        .dry_run(cli.dry_run);

    runner
        .run(&job.keys, &job.descriptor)
        .context("Batch could not start")
}

fn show_status(job: &MatteJob) -> Result<()> {
    let _span = spans::maintenance("status", job.keys.len()).entered();
    let tag = &job.descriptor.backup_tag;

    println!("📋 Asset states relative to backup tag '{}':", tag);
    for key in &job.keys {
        match job.store.state(key, tag) {
            Ok(state) => println!("  {:<32} {}", key, state),
            Err(e) => println!("  {:<32} unknown ({})", key, e),
        }
    }
    Ok(())
}

fn restore_assets(job: &MatteJob) -> Result<()> {
    let _span = spans::maintenance("restore", job.keys.len()).entered();
    let tag = &job.descriptor.backup_tag;

    let mut failed = 0usize;
    for key in &job.keys {
        match job.store.restore(key, tag) {
            Ok(path) => println!("  ♻️  {} <- {}", path.display(), tag),
            Err(e) => {
                error!("Failed to restore {}: {}", key, e);
                failed += 1;
            },
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} assets could not be restored", failed, job.keys.len());
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!(
        "📊 {}{}: {} succeeded, {} failed",
        report.strategy,
        mode,
        report.succeeded(),
        report.failed()
    );
    for outcome in report.failures() {
        if let Some(failure) = &outcome.failure {
            println!("  ❌ {} [{}] {}", outcome.asset_key, failure.kind, failure.message);
        }
    }
}

/// Progress reporter backed by an indicatif bar
struct BarProgressReporter {
    bar: ProgressBar,
}

impl BarProgressReporter {
    fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressReporter for BarProgressReporter {
    fn report_item_start(&self, _index: usize, _total: usize, asset_key: &str) {
        self.bar.set_message(asset_key.to_string());
    }

    fn report_item_outcome(&self, outcome: &AssetOutcome) {
        if let Some(failure) = &outcome.failure {
            self.bar
                .println(format!("❌ {}: {}", outcome.asset_key, failure.kind));
        }
        self.bar.inc(1);
    }

    fn report_batch_complete(&self, report: &BatchReport) {
        self.bar.finish_with_message(format!(
            "{} ok, {} failed",
            report.succeeded(),
            report.failed()
        ));
    }
}
