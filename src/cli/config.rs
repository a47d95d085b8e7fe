//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{MatteConfig, StrategyDescriptor, StrategyKind},
    manifest::AssetManifest,
    store::AssetVersionStore,
    strategies::{external::DEFAULT_SEGMENTER_COMMAND, CommandSegmenter, DefaultStrategyFactory},
};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything a CLI invocation needs, after manifest and flags are merged
#[derive(Debug, Clone)]
pub(crate) struct MatteJob {
    pub(crate) store: AssetVersionStore,
    pub(crate) keys: Vec<String>,
    pub(crate) descriptor: StrategyDescriptor,
    pub(crate) matte: MatteConfig,
    pub(crate) segmenter: Option<String>,
}

/// Convert CLI arguments into a [`MatteJob`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Merge the manifest (if any) with command-line overrides
    ///
    /// Explicit flags win over manifest values, which win over defaults.
    pub(crate) fn from_cli(cli: &Cli) -> Result<MatteJob> {
        let (mut store, mut keys, mut descriptor, base_matte, segmenter) =
            if let Some(path) = &cli.manifest {
                let manifest = AssetManifest::load(path)
                    .with_context(|| format!("Failed to load manifest {}", path.display()))?;
                let keys = if cli.keys.is_empty() {
                    manifest.asset_keys()?
                } else {
                    Vec::new()
                };
                (
                    manifest.store(),
                    keys,
                    manifest.descriptor(),
                    manifest.matte_config(),
                    manifest.segmenter.clone(),
                )
            } else if let Some(dir) = &cli.assets_dir {
                (
                    AssetVersionStore::new(dir),
                    Vec::new(),
                    StrategyDescriptor::new(StrategyKind::PixelThreshold),
                    MatteConfig::default(),
                    None,
                )
            } else {
                anyhow::bail!("Either --manifest or --assets-dir is required");
            };

        if !cli.keys.is_empty() {
            keys = cli.keys.clone();
        }
        if keys.is_empty() {
            anyhow::bail!("No asset keys given");
        }

        if let Some(extension) = &cli.extension {
            store = AssetVersionStore::with_extension(store.root(), extension.as_str());
        }

        if let Some(strategy) = cli.strategy {
            let kind = StrategyKind::from(strategy);
            if kind != descriptor.kind {
                descriptor = StrategyDescriptor::new(kind);
            }
        }
        if let Some(tag) = &cli.backup_tag {
            descriptor = descriptor.with_backup_tag(tag.clone());
        }
        if cli.pristine {
            descriptor = descriptor.with_pristine_source(true);
        } else if cli.no_pristine {
            descriptor = descriptor.with_pristine_source(false);
        }
        descriptor.validate().context("Invalid backup tag")?;

        let matte = Self::matte_config(cli, base_matte)?;
        let segmenter = cli.segmenter_command.clone().or(segmenter);

        Ok(MatteJob {
            store,
            keys,
            descriptor,
            matte,
            segmenter,
        })
    }

    fn matte_config(cli: &Cli, base: MatteConfig) -> Result<MatteConfig> {
        MatteConfig::builder()
            .threshold(cli.threshold.unwrap_or(base.threshold))
            .close_iterations(cli.close_iterations.unwrap_or(base.close_iterations))
            .open_iterations(cli.open_iterations.unwrap_or(base.open_iterations))
            .kernel_size(cli.kernel_size.unwrap_or(base.kernel_size))
            .build()
            .context("Invalid matte parameters")
    }

    /// Strategy factory with a command segmenter injected when one is needed
    pub(crate) fn strategy_factory(job: &MatteJob) -> Result<DefaultStrategyFactory> {
        let factory = DefaultStrategyFactory::new();
        if job.descriptor.kind != StrategyKind::ExternalSegmentation && job.segmenter.is_none() {
            return Ok(factory);
        }

        let command = job
            .segmenter
            .as_deref()
            .unwrap_or(DEFAULT_SEGMENTER_COMMAND);
        let segmenter = CommandSegmenter::from_command_line(command)
            .with_context(|| format!("Invalid segmenter command '{}'", command))?;
        Ok(factory.with_segmenter(Arc::new(segmenter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::StrategyFactory;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn create_test_cli() -> Cli {
        Cli {
            keys: vec!["fish_origami".to_string()],
            manifest: None,
            assets_dir: Some(PathBuf::from("cards")),
            extension: None,
            strategy: None,
            threshold: None,
            close_iterations: None,
            open_iterations: None,
            kernel_size: None,
            backup_tag: None,
            pristine: false,
            no_pristine: false,
            segmenter_command: None,
            dry_run: false,
            status: false,
            restore: false,
            report: None,
            progress: false,
            verbose: 0,
        }
    }

    #[test]
    fn test_directory_defaults() {
        let job = CliConfigBuilder::from_cli(&create_test_cli()).unwrap();
        assert_eq!(job.keys, vec!["fish_origami"]);
        assert_eq!(job.store.root(), PathBuf::from("cards").as_path());
        assert_eq!(job.store.extension(), "png");
        assert_eq!(job.descriptor, StrategyDescriptor::new(StrategyKind::PixelThreshold));
        assert_eq!(job.matte, MatteConfig::default());
    }

    #[test]
    fn test_flag_overrides() {
        let mut cli = create_test_cli();
        cli.strategy = Some(crate::cli::CliStrategy::Morphological);
        cli.no_pristine = true;
        cli.backup_tag = Some("orig".to_string());
        cli.threshold = Some(220);
        cli.kernel_size = Some(5);

        let job = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(job.descriptor.kind, StrategyKind::MorphologicalThreshold);
        assert_eq!(job.descriptor.backup_tag, "orig");
        assert!(!job.descriptor.requires_pristine_source);
        assert_eq!(job.matte.threshold, 220);
        assert_eq!(job.matte.kernel_size, 5);
        assert_eq!(job.matte.close_iterations, 2);
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let mut cli = create_test_cli();
        cli.kernel_size = Some(4);
        assert!(CliConfigBuilder::from_cli(&cli).is_err());

        let mut cli = create_test_cli();
        cli.backup_tag = Some("a/b".to_string());
        assert!(CliConfigBuilder::from_cli(&cli).is_err());

        let mut cli = create_test_cli();
        cli.keys.clear();
        assert!(CliConfigBuilder::from_cli(&cli).is_err());
    }

    #[test]
    fn test_manifest_merge() {
        let dir = tempdir().unwrap();
        let manifest_path = dir.path().join("cards.json");
        std::fs::write(
            &manifest_path,
            r#"{
                "assets_dir": "cards",
                "assets": ["fish_origami", "crab_origami"],
                "strategy": {"kind": "external-segmentation"},
                "matte": {"threshold": 200},
                "segmenter": "my-segmenter {input} {output}"
            }"#,
        )
        .unwrap();

        let mut cli = create_test_cli();
        cli.keys.clear();
        cli.assets_dir = None;
        cli.manifest = Some(manifest_path);
        cli.open_iterations = Some(0);

        let job = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(job.keys, vec!["fish_origami", "crab_origami"]);
        assert_eq!(job.store.root(), dir.path().join("cards").as_path());
        assert_eq!(job.descriptor.kind, StrategyKind::ExternalSegmentation);
        assert_eq!(job.descriptor.backup_tag, "before_rembg");
        assert_eq!(job.matte.threshold, 200);
        assert_eq!(job.matte.open_iterations, 0);
        assert_eq!(job.segmenter.as_deref(), Some("my-segmenter {input} {output}"));

        // Keys on the command line replace the manifest's list
        cli.keys = vec!["shark_origami".to_string()];
        let job = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(job.keys, vec!["shark_origami"]);
    }

    #[test]
    fn test_strategy_factory_injection() {
        let mut cli = create_test_cli();
        let job = CliConfigBuilder::from_cli(&cli).unwrap();
        let factory = CliConfigBuilder::strategy_factory(&job).unwrap();
        assert!(!factory
            .available_strategies()
            .contains(&StrategyKind::ExternalSegmentation));

        cli.strategy = Some(crate::cli::CliStrategy::External);
        let job = CliConfigBuilder::from_cli(&cli).unwrap();
        let factory = CliConfigBuilder::strategy_factory(&job).unwrap();
        assert!(factory
            .available_strategies()
            .contains(&StrategyKind::ExternalSegmentation));

        cli.segmenter_command = Some("rembg i {input}".to_string());
        let job = CliConfigBuilder::from_cli(&cli).unwrap();
        assert!(CliConfigBuilder::strategy_factory(&job).is_err());
    }
}
