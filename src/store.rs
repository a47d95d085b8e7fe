//! Per-asset backup management and source resolution
//!
//! Every asset lives at `<dir>/<key>.<ext>`. Each strategy owns one backup
//! family at `<dir>/<key>_<tag>.<ext>`, created once from the asset's bytes
//! and never overwritten afterwards. That single rule is what makes repeated
//! batch runs safe.

use crate::{
    config::StrategyDescriptor,
    error::{MatteError, Result},
    types::AssetState,
};
use sha2::{Digest, Sha256};
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Default extension for asset files
pub const DEFAULT_EXTENSION: &str = "png";

/// Suffix of in-flight backup copies; never a valid asset extension
const STAGING_SUFFIX: &str = ".partial";

/// Filesystem-backed store of assets and their backups
#[derive(Debug, Clone)]
pub struct AssetVersionStore {
    root: PathBuf,
    extension: String,
}

impl AssetVersionStore {
    /// Create a store rooted at `root` using PNG files
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_extension(root, DEFAULT_EXTENSION)
    }

    /// Create a store rooted at `root` for files with `extension`
    pub fn with_extension<P: Into<PathBuf>, S: Into<String>>(root: P, extension: S) -> Self {
        let extension = extension.into();
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of the asset's current file
    #[must_use]
    pub fn current_path(&self, asset_key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", asset_key, self.extension))
    }

    /// Path of the asset's backup for `tag`
    #[must_use]
    pub fn backup_path(&self, asset_key: &str, tag: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}.{}", asset_key, tag, self.extension))
    }

    /// Copy the current file to the tag's backup path unless a backup exists
    ///
    /// # Errors
    /// - `MissingAsset` when no backup exists and the current file is absent
    /// - `Io` when the copy fails; the backup path is then still free
    #[instrument(skip(self))]
    pub fn ensure_backup(&self, asset_key: &str, tag: &str) -> Result<PathBuf> {
        let backup = self.backup_path(asset_key, tag);
        if backup.is_file() {
            debug!(backup = %backup.display(), "Backup already present");
            return Ok(backup);
        }

        let current = self.current_path(asset_key);
        if !current.is_file() {
            return Err(MatteError::missing_asset_at(asset_key, &current));
        }

        // Stage next to the backup so a partial copy never occupies its path
        let prefix = format!(".{}_{}.", asset_key, tag);
        let mut staging = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(|e| MatteError::file_io_error("stage backup in", &self.root, &e))?;
        let mut source = File::open(&current)
            .map_err(|e| MatteError::file_io_error("open", &current, &e))?;
        io::copy(&mut source, staging.as_file_mut())
            .and_then(|_| staging.as_file().set_permissions(source.metadata()?.permissions()))
            .and_then(|()| staging.as_file().sync_all())
            .map_err(|e| MatteError::file_io_error("copy backup of", &current, &e))?;
        staging
            .persist_noclobber(&backup)
            .map_err(|e| MatteError::file_io_error("create backup", &backup, &e.error))?;

        let digest = Self::digest(&backup)?;
        info!(
            asset = %asset_key,
            backup = %backup.display(),
            sha256 = %digest,
            "Created backup"
        );
        Ok(backup)
    }

    /// Pick the file a strategy should read
    ///
    /// Strategies declaring a pristine source get the backup (taken now if
    /// absent); all others get the current, possibly already matted, file.
    ///
    /// # Errors
    /// - `MissingAsset` when the chosen file cannot exist
    pub fn resolve_source(
        &self,
        asset_key: &str,
        descriptor: &StrategyDescriptor,
    ) -> Result<PathBuf> {
        if descriptor.requires_pristine_source {
            return self.ensure_backup(asset_key, &descriptor.backup_tag);
        }

        let current = self.current_path(asset_key);
        if current.is_file() {
            Ok(current)
        } else {
            Err(MatteError::missing_asset_at(asset_key, &current))
        }
    }

    /// Like [`resolve_source`](Self::resolve_source) but never touches the filesystem
    ///
    /// A pristine-source strategy whose backup has not been taken yet reads
    /// the current file, which is exactly what the backup would contain.
    pub fn peek_source(&self, asset_key: &str, descriptor: &StrategyDescriptor) -> Result<PathBuf> {
        if descriptor.requires_pristine_source {
            let backup = self.backup_path(asset_key, &descriptor.backup_tag);
            if backup.is_file() {
                return Ok(backup);
            }
        }

        let current = self.current_path(asset_key);
        if current.is_file() {
            Ok(current)
        } else {
            Err(MatteError::missing_asset_at(asset_key, &current))
        }
    }

    /// Lifecycle state of an asset relative to `tag`
    pub fn state(&self, asset_key: &str, tag: &str) -> Result<AssetState> {
        let current = self.current_path(asset_key);
        let backup = self.backup_path(asset_key, tag);

        match (current.is_file(), backup.is_file()) {
            (false, false) => Ok(AssetState::Missing),
            (true, false) => Ok(AssetState::Pristine),
            (false, true) => Ok(AssetState::Matted),
            (true, true) => {
                if Self::digest(&current)? == Self::digest(&backup)? {
                    Ok(AssetState::BackedUp)
                } else {
                    Ok(AssetState::Matted)
                }
            },
        }
    }

    /// Copy the tag's backup verbatim over the current file
    ///
    /// # Errors
    /// - `MissingAsset` when the backup does not exist
    /// - `Write` when the current file cannot be replaced
    #[instrument(skip(self))]
    pub fn restore(&self, asset_key: &str, tag: &str) -> Result<PathBuf> {
        let backup = self.backup_path(asset_key, tag);
        if !backup.is_file() {
            return Err(MatteError::missing_asset_at(asset_key, &backup));
        }

        let current = self.current_path(asset_key);
        std::fs::copy(&backup, &current).map_err(|e| {
            MatteError::write(format!(
                "Failed to restore '{}' from '{}': {}",
                current.display(),
                backup.display(),
                e
            ))
        })?;
        info!(asset = %asset_key, from = %backup.display(), "Restored asset from backup");
        Ok(current)
    }

    /// True when `file_stem` names a backup side-file for any of `tags`
    #[must_use]
    pub fn is_backup_stem(file_stem: &str, tags: &[&str]) -> bool {
        tags.iter().any(|tag| {
            file_stem
                .strip_suffix(tag)
                .and_then(|rest| rest.strip_suffix('_'))
                .is_some_and(|key| !key.is_empty())
        })
    }

    /// Hex SHA-256 of a file's contents
    pub fn digest<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).map_err(|e| MatteError::file_io_error("read", path, &e))?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}
