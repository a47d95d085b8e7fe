//! Progress reporting service
//!
//! This module separates progress reporting concerns from batch logic,
//! allowing different frontends to implement their own progress handling.

use crate::batch::{AssetOutcome, BatchReport};

/// Stages an asset passes through during a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStage {
    /// Choosing the input file for the strategy
    ResolvingSource,
    /// Taking the strategy's backup
    BackingUp,
    /// Decoding the input image
    Decoding,
    /// Running the matte strategy
    Matting,
    /// Re-decoding the encoded output
    Validating,
    /// Overwriting the asset's current file
    Persisting,
}

impl AssetStage {
    /// Get a human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            AssetStage::ResolvingSource => "Resolving source file",
            AssetStage::BackingUp => "Ensuring backup",
            AssetStage::Decoding => "Decoding image",
            AssetStage::Matting => "Extracting matte",
            AssetStage::Validating => "Validating output",
            AssetStage::Persisting => "Writing result",
        }
    }
}

/// Trait for reporting progress during a batch run
pub trait ProgressReporter {
    /// An asset is about to be processed (`index` is 1-based)
    fn report_item_start(&self, index: usize, total: usize, asset_key: &str);

    /// An asset entered a new stage
    fn report_item_stage(&self, asset_key: &str, stage: AssetStage) {
        let _ = (asset_key, stage);
    }

    /// An asset finished, successfully or not
    fn report_item_outcome(&self, outcome: &AssetOutcome);

    /// The whole batch finished
    fn report_batch_complete(&self, report: &BatchReport);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_item_start(&self, _index: usize, _total: usize, _asset_key: &str) {}

    fn report_item_outcome(&self, _outcome: &AssetOutcome) {}

    fn report_batch_complete(&self, _report: &BatchReport) {}
}

/// Console progress reporter that logs progress through the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to log every stage transition
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_item_start(&self, index: usize, total: usize, asset_key: &str) {
        log::info!("[{}/{}] Processing: {}", index, total, asset_key);
    }

    fn report_item_stage(&self, asset_key: &str, stage: AssetStage) {
        if self.verbose {
            log::debug!("  {}: {}", asset_key, stage.description());
        }
    }

    fn report_item_outcome(&self, outcome: &AssetOutcome) {
        match &outcome.failure {
            None => log::info!("  ✅ {} ({}ms)", outcome.asset_key, outcome.elapsed_ms),
            Some(failure) => log::error!(
                "  ❌ {}: {} - {}",
                outcome.asset_key,
                failure.kind,
                failure.message
            ),
        }
    }

    fn report_batch_complete(&self, report: &BatchReport) {
        log::info!(
            "📊 {} finished: {} succeeded, {} failed",
            report.strategy,
            report.succeeded(),
            report.failed()
        );
        if self.verbose {
            for outcome in report.failures() {
                if let Some(failure) = &outcome.failure {
                    log::info!("  • {} [{}] {}", outcome.asset_key, failure.kind, failure.message);
                }
            }
        }
    }
}
