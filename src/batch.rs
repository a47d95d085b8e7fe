//! Batch runner
//!
//! Processes assets strictly one after another. Every per-asset failure is
//! caught, classified and recorded; only an empty key list or a strategy
//! that cannot be built aborts a run. The current file is written only after
//! the strategy output has been encoded and decoded back successfully, so a
//! failed asset is left exactly as it was.

use crate::{
    config::{MatteConfig, StrategyDescriptor, StrategyKind},
    error::{FailureKind, MatteError, Result},
    services::{AssetStage, ImageIOService, NoOpProgressReporter, ProgressReporter},
    store::AssetVersionStore,
    strategies::{MatteStrategy, StrategyFactory},
};
use chrono::{DateTime, Utc};
use image::ImageFormat;
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, span, warn, Level};
use uuid::Uuid;

/// Why an asset failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&MatteError> for AssetFailure {
    fn from(error: &MatteError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result of processing one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOutcome {
    pub asset_key: String,
    /// File the strategy read, when resolution got that far
    pub source: Option<PathBuf>,
    pub elapsed_ms: u64,
    /// `None` on success
    pub failure: Option<AssetFailure>,
}

impl AssetOutcome {
    #[must_use]
    pub fn success<S: Into<String>>(asset_key: S, source: PathBuf, elapsed_ms: u64) -> Self {
        Self {
            asset_key: asset_key.into(),
            source: Some(source),
            elapsed_ms,
            failure: None,
        }
    }

    #[must_use]
    pub fn failure<S: Into<String>>(
        asset_key: S,
        source: Option<PathBuf>,
        elapsed_ms: u64,
        failure: AssetFailure,
    ) -> Self {
        Self {
            asset_key: asset_key.into(),
            source,
            elapsed_ms,
            failure: Some(failure),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub strategy: StrategyKind,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    /// One entry per requested key, in input order
    pub outcomes: Vec<AssetOutcome>,
}

impl BatchReport {
    #[must_use]
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            strategy,
            started_at: Utc::now(),
            dry_run: false,
            outcomes: Vec::new(),
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Failed outcomes in input order
    pub fn failures(&self) -> impl Iterator<Item = &AssetOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// True when every asset succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| MatteError::write(format!("Failed to serialize report: {}", e)))
    }

    /// Write the JSON report to `path`
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json()?;
        ImageIOService::write_bytes(path, json.as_bytes())
    }
}

/// Runs one strategy over a list of assets
pub struct BatchRunner {
    store: AssetVersionStore,
    factory: Box<dyn StrategyFactory>,
    config: MatteConfig,
    reporter: Box<dyn ProgressReporter>,
    dry_run: bool,
}

impl BatchRunner {
    /// Create a runner with a silent progress reporter
    #[must_use]
    pub fn new(
        store: AssetVersionStore,
        factory: Box<dyn StrategyFactory>,
        config: MatteConfig,
    ) -> Self {
        Self {
            store,
            factory,
            config,
            reporter: Box::new(NoOpProgressReporter),
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Resolve, decode, matte and validate without creating backups or writing
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn store(&self) -> &AssetVersionStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &MatteConfig {
        &self.config
    }

    /// Process `asset_keys` in order with the strategy named by `descriptor`
    ///
    /// # Errors
    /// - `InvalidConfig` when `asset_keys` is empty, the strategy cannot be
    ///   built, or the store's extension cannot hold a lossless matte
    ///
    /// Per-asset failures never surface here; they are recorded in the report.
    #[instrument(
        skip(self, asset_keys, descriptor),
        fields(
            strategy = %descriptor.kind,
            backup_tag = %descriptor.backup_tag,
            assets = asset_keys.len(),
            dry_run = self.dry_run
        )
    )]
    pub fn run<S: AsRef<str>>(
        &self,
        asset_keys: &[S],
        descriptor: &StrategyDescriptor,
    ) -> Result<BatchReport> {
        if asset_keys.is_empty() {
            return Err(MatteError::invalid_config("no assets to process"));
        }
        let strategy = self.factory.create_strategy(descriptor, &self.config)?;
        let format = ImageIOService::output_format_for(self.store.extension())?;

        let mut report = BatchReport::new(descriptor.kind);
        report.dry_run = self.dry_run;
        info!(run_id = %report.run_id, "🚀 Starting batch");

        let total = asset_keys.len();
        for (index, key) in asset_keys.iter().enumerate() {
            let key = key.as_ref();
            self.reporter.report_item_start(index + 1, total, key);

            let start = Instant::now();
            let mut source = None;
            let result = self.process_asset(key, strategy.as_ref(), format, &mut source);
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let outcome = match result {
                Ok(()) => AssetOutcome {
                    asset_key: key.to_string(),
                    source,
                    elapsed_ms,
                    failure: None,
                },
                Err(e) => {
                    warn!(asset = %key, kind = %e.kind(), error = %e, "Asset failed");
                    AssetOutcome::failure(key, source, elapsed_ms, AssetFailure::from(&e))
                },
            };

            self.reporter.report_item_outcome(&outcome);
            report.outcomes.push(outcome);
        }

        info!(
            run_id = %report.run_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch complete"
        );
        self.reporter.report_batch_complete(&report);
        Ok(report)
    }

    fn process_asset(
        &self,
        key: &str,
        strategy: &dyn MatteStrategy,
        format: ImageFormat,
        source_out: &mut Option<PathBuf>,
    ) -> Result<()> {
        let descriptor = strategy.descriptor();
        crate::manifest::validate_asset_key(key).map_err(|e| {
            MatteError::missing_asset(format!("asset '{}' cannot be addressed: {}", key, e))
        })?;

        self.reporter.report_item_stage(key, AssetStage::ResolvingSource);
        let source = if self.dry_run {
            self.store.peek_source(key, descriptor)?
        } else {
            self.store.resolve_source(key, descriptor)?
        };
        *source_out = Some(source.clone());

        if !self.dry_run {
            self.reporter.report_item_stage(key, AssetStage::BackingUp);
            self.store.ensure_backup(key, &descriptor.backup_tag)?;
        }

        self.reporter.report_item_stage(key, AssetStage::Decoding);
        let image = {
            let _span = span!(Level::DEBUG, "decode", source = %source.display()).entered();
            ImageIOService::load_image(&source)?
        };
        let dimensions = (image.width(), image.height());

        self.reporter.report_item_stage(key, AssetStage::Matting);
        let matted = {
            let _span = span!(Level::DEBUG, "matte", width = dimensions.0, height = dimensions.1)
                .entered();
            strategy.apply(&image).map_err(|e| match e {
                MatteError::StrategyFailed(_) => e,
                other => MatteError::strategy_failed(other.to_string()),
            })?
        };

        self.reporter.report_item_stage(key, AssetStage::Validating);
        let bytes = ImageIOService::encode(&matted, format)
            .map_err(|e| MatteError::strategy_failed(format!("output cannot be encoded: {}", e)))?;
        ImageIOService::validate_matte_output(&bytes, dimensions)?;

        if self.dry_run {
            info!(asset = %key, "Dry run: result validated, not written");
            return Ok(());
        }

        self.reporter.report_item_stage(key, AssetStage::Persisting);
        let destination = self.store.current_path(key);
        {
            let _span = span!(Level::DEBUG, "persist", path = %destination.display()).entered();
            ImageIOService::write_bytes(&destination, &bytes)?;
        }
        info!(asset = %key, path = %destination.display(), bytes = bytes.len(), "Matte written");
        Ok(())
    }
}
