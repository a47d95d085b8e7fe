//! Error types for matte extraction and asset handling

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for matte operations
pub type Result<T> = std::result::Result<T, MatteError>;

/// Error types for matte extraction, asset versioning and batch runs
#[derive(Error, Debug)]
pub enum MatteError {
    /// Neither the current file nor the required backup exists
    #[error("Missing asset: {0}")]
    MissingAsset(String),

    /// File exists but cannot be parsed as a raster image
    #[error("Decode error: {0}")]
    Decode(String),

    /// The matte algorithm (local or external) failed
    #[error("Strategy failed: {0}")]
    StrategyFailed(String),

    /// The transformed image could not be persisted
    #[error("Write error: {0}")]
    Write(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// User-visible failure classification recorded per asset in a batch report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    MissingAssetError,
    DecodeError,
    StrategyFailed,
    WriteError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingAssetError => write!(f, "MissingAssetError"),
            Self::DecodeError => write!(f, "DecodeError"),
            Self::StrategyFailed => write!(f, "StrategyFailed"),
            Self::WriteError => write!(f, "WriteError"),
        }
    }
}

impl MatteError {
    /// Create a new missing asset error
    pub fn missing_asset<S: Into<String>>(msg: S) -> Self {
        Self::MissingAsset(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new strategy failure
    pub fn strategy_failed<S: Into<String>>(msg: S) -> Self {
        Self::StrategyFailed(msg.into())
    }

    /// Create a new write error
    pub fn write<S: Into<String>>(msg: S) -> Self {
        Self::Write(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create missing asset error naming the asset and the paths probed
    pub fn missing_asset_at<P: AsRef<std::path::Path>>(asset_key: &str, path: P) -> Self {
        Self::MissingAsset(format!(
            "asset '{}' has no file at '{}'",
            asset_key,
            path.as_ref().display()
        ))
    }

    /// Create decode error with path and format context
    pub fn decode_error_at<P: AsRef<std::path::Path>>(path: P, error: &image::ImageError) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");
        Self::Decode(format!(
            "Failed to decode '{}' (extension: {}): {}",
            path.as_ref().display(),
            extension,
            error
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Classify this error into the failure kind shown in batch reports
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingAsset(_) => FailureKind::MissingAssetError,
            Self::Decode(_) => FailureKind::DecodeError,
            Self::Write(_) | Self::Io(_) => FailureKind::WriteError,
            Self::StrategyFailed(_) | Self::InvalidConfig(_) => FailureKind::StrategyFailed,
        }
    }
}
