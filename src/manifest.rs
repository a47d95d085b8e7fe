//! Declarative asset manifest
//!
//! A manifest names the asset directory, the keys to process (explicitly or
//! through a glob) and optionally the strategy, its parameters and the
//! external segmenter command:
//!
//! ```json
//! {
//!   "assets_dir": "../public/assets/cards",
//!   "assets": ["fish_origami", "crab_origami"],
//!   "pattern": "*_origami.png",
//!   "strategy": { "kind": "morphological-threshold" },
//!   "matte": { "threshold": 235 }
//! }
//! ```

use crate::{
    config::{MatteConfig, StrategyDescriptor, StrategyKind},
    error::{MatteError, Result},
    store::{AssetVersionStore, DEFAULT_EXTENSION},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

/// Strategy selection inside a manifest; unset fields take the kind's defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestStrategy {
    pub kind: StrategyKind,
    #[serde(default)]
    pub backup_tag: Option<String>,
    #[serde(default)]
    pub requires_pristine_source: Option<bool>,
}

impl ManifestStrategy {
    /// Resolve into a full descriptor
    #[must_use]
    pub fn descriptor(&self) -> StrategyDescriptor {
        let mut descriptor = StrategyDescriptor::new(self.kind);
        if let Some(tag) = &self.backup_tag {
            descriptor = descriptor.with_backup_tag(tag.clone());
        }
        if let Some(pristine) = self.requires_pristine_source {
            descriptor = descriptor.with_pristine_source(pristine);
        }
        descriptor
    }
}

/// Set of assets to process and how to process them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetManifest {
    /// Directory holding the assets; relative paths resolve against the manifest file
    pub assets_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Explicit asset keys, processed first and in this order
    #[serde(default)]
    pub assets: Vec<String>,
    /// Glob relative to `assets_dir`; matches contribute keys by file stem
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub strategy: Option<ManifestStrategy>,
    #[serde(default)]
    pub matte: Option<MatteConfig>,
    /// Segmenter command line with `{input}` / `{output}` placeholders
    #[serde(default)]
    pub segmenter: Option<String>,
}

impl AssetManifest {
    /// Load and validate a manifest from a JSON file
    ///
    /// # Errors
    /// - `InvalidConfig` when the file cannot be read or parsed, or lists no assets
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MatteError::invalid_config(format!(
                "cannot read manifest '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut manifest = Self::from_json(&text).map_err(|e| {
            MatteError::invalid_config(format!("manifest '{}': {}", path.display(), e))
        })?;

        if manifest.assets_dir.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            manifest.assets_dir = base.join(&manifest.assets_dir);
        }

        info!(
            manifest = %path.display(),
            assets_dir = %manifest.assets_dir.display(),
            explicit = manifest.assets.len(),
            "Loaded asset manifest"
        );
        Ok(manifest)
    }

    /// Parse and validate a manifest from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(text)
            .map_err(|e| MatteError::invalid_config(format!("invalid manifest JSON: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check keys, extension and embedded configuration
    pub fn validate(&self) -> Result<()> {
        if self.assets.is_empty() && self.pattern.is_none() {
            return Err(MatteError::invalid_config(
                "manifest lists no assets (set `assets` or `pattern`)",
            ));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(MatteError::invalid_config("manifest extension must not be empty"));
        }
        for key in &self.assets {
            validate_asset_key(key)?;
        }
        self.descriptor().validate()?;
        if let Some(matte) = &self.matte {
            matte.validate()?;
        }
        Ok(())
    }

    /// Strategy descriptor, defaulting to the pixel threshold
    #[must_use]
    pub fn descriptor(&self) -> StrategyDescriptor {
        self.strategy.as_ref().map_or_else(
            || StrategyDescriptor::new(StrategyKind::PixelThreshold),
            ManifestStrategy::descriptor,
        )
    }

    /// Matte parameters, defaulting to [`MatteConfig::default`]
    #[must_use]
    pub fn matte_config(&self) -> MatteConfig {
        self.matte.clone().unwrap_or_default()
    }

    /// Store rooted at the manifest's asset directory
    #[must_use]
    pub fn store(&self) -> AssetVersionStore {
        AssetVersionStore::with_extension(&self.assets_dir, self.extension.as_str())
    }

    /// Asset keys in processing order, without duplicates
    ///
    /// Explicit keys come first, then glob matches sorted by path. Matches
    /// whose stem is a backup side-file of any known tag are skipped.
    ///
    /// # Errors
    /// - `InvalidConfig` for a malformed pattern or when no key results
    pub fn asset_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = Vec::new();
        for key in &self.assets {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }

        if let Some(pattern) = &self.pattern {
            let descriptor = self.descriptor();
            let mut tags: Vec<&str> = StrategyKind::ALL
                .iter()
                .map(|k| k.default_backup_tag())
                .collect();
            tags.push(descriptor.backup_tag.as_str());

            // Only the pattern is glob syntax; brackets in the directory are literal
            let dir = glob::Pattern::escape(&self.assets_dir.to_string_lossy());
            let full = Path::new(&dir).join(pattern);
            let full = full.to_string_lossy();
            let extension = self.store().extension().to_string();
            let entries = glob::glob(&full).map_err(|e| {
                MatteError::invalid_config(format!("invalid asset pattern '{}': {}", pattern, e))
            })?;

            let mut matched: Vec<PathBuf> = entries
                .filter_map(|entry| match entry {
                    Ok(path) => Some(path),
                    Err(e) => {
                        debug!("Skipping unreadable glob entry: {}", e);
                        None
                    },
                })
                .filter(|path| path.is_file())
                .filter(|path| {
                    path.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case(&extension))
                })
                .collect();
            matched.sort();

            for path in matched {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if AssetVersionStore::is_backup_stem(stem, &tags) {
                    debug!(file = %path.display(), "Skipping backup side-file");
                    continue;
                }
                if !keys.iter().any(|k| k == stem) {
                    keys.push(stem.to_string());
                }
            }
        }

        if keys.is_empty() {
            return Err(MatteError::invalid_config(format!(
                "manifest resolved to no assets in '{}'",
                self.assets_dir.display()
            )));
        }
        Ok(keys)
    }
}

/// Reject keys that are empty or carry path components
pub fn validate_asset_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(MatteError::invalid_config("asset key must not be empty"));
    }
    if key.contains('/') || key.contains('\\') || key == "." || key == ".." {
        return Err(MatteError::invalid_config(format!(
            "asset key '{}' must be a bare file stem",
            key
        )));
    }
    Ok(())
}
