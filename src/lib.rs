#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Card Matte
//!
//! Alpha-matte extraction for card art drawn on white or near-white
//! backgrounds. Each asset is a single image file; the library turns its
//! background transparent in place while keeping one untouched backup per
//! strategy, so repeated runs are always safe.
//!
//! ## Features
//!
//! - **Pixel threshold**: clears every pixel whose R, G and B exceed a threshold
//! - **Morphological threshold**: luma threshold cleaned up with closing and
//!   opening, producing a hard (strictly binary) matte
//! - **External segmentation**: delegates to a program such as `rembg` through
//!   an injectable [`SegmentationService`]
//! - **Asset versioning**: idempotent `<key>_<tag>.<ext>` backups, state
//!   inspection and restore
//! - **Batch runs**: per-asset failure isolation with a serialisable report
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use card_matte::{
//!     AssetVersionStore, BatchRunner, DefaultStrategyFactory, MatteConfig,
//!     StrategyDescriptor, StrategyKind,
//! };
//!
//! # fn example() -> card_matte::Result<()> {
//! let store = AssetVersionStore::new("public/assets/cards");
//! let runner = BatchRunner::new(
//!     store,
//!     Box::new(DefaultStrategyFactory::new()),
//!     MatteConfig::default(),
//! );
//!
//! let descriptor = StrategyDescriptor::new(StrategyKind::MorphologicalThreshold);
//! let report = runner.run(&["fish_origami", "crab_origami"], &descriptor)?;
//! for outcome in report.failures() {
//!     eprintln!("{}: {:?}", outcome.asset_key, outcome.failure);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Manifest-driven runs
//!
//! ```rust,no_run
//! use card_matte::{AssetManifest, BatchRunner, DefaultStrategyFactory};
//!
//! # fn example() -> card_matte::Result<()> {
//! let manifest = AssetManifest::load("cards.json")?;
//! let runner = BatchRunner::new(
//!     manifest.store(),
//!     Box::new(DefaultStrategyFactory::new()),
//!     manifest.matte_config(),
//! );
//! let report = runner.run(&manifest.asset_keys()?, &manifest.descriptor())?;
//! println!("{}", report.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bar and tracing subscriber
//! - `webp-support` (default): WebP input and lossless WebP output
//! - `tracing-json`: JSON log output for the CLI
//! - `tracing-files`: log file output for the CLI

pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod services;
pub mod store;
pub mod strategies;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use batch::{AssetFailure, AssetOutcome, BatchReport, BatchRunner};
pub use config::{MatteConfig, MatteConfigBuilder, StrategyDescriptor, StrategyKind};
pub use error::{FailureKind, MatteError, Result};
pub use manifest::{AssetManifest, ManifestStrategy};
pub use services::{
    AssetStage, ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProgressReporter,
};
pub use store::AssetVersionStore;
pub use strategies::{
    CommandSegmenter, DefaultStrategyFactory, ExternalSegmentationStrategy, MatteStrategy,
    MorphologicalThresholdStrategy, PixelThresholdStrategy, SegmentationService, StrategyFactory,
};
pub use types::{AssetState, Mask};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat, TracingOutput};
