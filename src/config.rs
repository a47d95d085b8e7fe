//! Configuration types for matte strategies

use crate::error::{MatteError, Result};
use serde::{Deserialize, Serialize};

/// Default brightness threshold above which a pixel counts as background
pub const DEFAULT_THRESHOLD: u8 = 240;

/// Matte algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Per-pixel RGB threshold, no neighbourhood
    PixelThreshold,
    /// Luma threshold cleaned up with closing and opening
    MorphologicalThreshold,
    /// Delegates to an external segmentation service
    ExternalSegmentation,
}

impl StrategyKind {
    /// All strategy kinds, in display order
    pub const ALL: [StrategyKind; 3] = [
        Self::PixelThreshold,
        Self::MorphologicalThreshold,
        Self::ExternalSegmentation,
    ];

    /// Backup tag used when none is configured
    #[must_use]
    pub fn default_backup_tag(self) -> &'static str {
        match self {
            Self::PixelThreshold | Self::MorphologicalThreshold => "backup",
            Self::ExternalSegmentation => "before_rembg",
        }
    }

    /// Whether the strategy reads the pristine backup unless configured otherwise
    ///
    /// The morphological matte must never run on an already-matted file.
    #[must_use]
    pub fn default_requires_pristine_source(self) -> bool {
        matches!(self, Self::MorphologicalThreshold)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PixelThreshold => write!(f, "pixel-threshold"),
            Self::MorphologicalThreshold => write!(f, "morphological-threshold"),
            Self::ExternalSegmentation => write!(f, "external-segmentation"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = MatteError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pixel-threshold" | "pixel" | "threshold" => Ok(Self::PixelThreshold),
            "morphological-threshold" | "morphological" | "opencv" => {
                Ok(Self::MorphologicalThreshold)
            },
            "external-segmentation" | "external" | "rembg" => Ok(Self::ExternalSegmentation),
            other => Err(MatteError::invalid_config(format!(
                "unknown strategy '{}' (expected pixel-threshold, morphological-threshold or external-segmentation)",
                other
            ))),
        }
    }
}

/// Metadata identifying a matte algorithm and how its input is chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    /// Which algorithm to run
    pub kind: StrategyKind,
    /// Suffix of the backup family this strategy owns (`<key>_<tag>.<ext>`)
    pub backup_tag: String,
    /// Read the pristine backup instead of the current file
    pub requires_pristine_source: bool,
}

impl StrategyDescriptor {
    /// Descriptor with the defaults for `kind`
    #[must_use]
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            backup_tag: kind.default_backup_tag().to_string(),
            requires_pristine_source: kind.default_requires_pristine_source(),
        }
    }

    #[must_use]
    pub fn with_backup_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.backup_tag = tag.into();
        self
    }

    #[must_use]
    pub fn with_pristine_source(mut self, requires_pristine_source: bool) -> Self {
        self.requires_pristine_source = requires_pristine_source;
        self
    }

    /// Validate the backup tag
    ///
    /// Tags become part of a filename, so they must be non-empty and free of
    /// path separators.
    pub fn validate(&self) -> Result<()> {
        if self.backup_tag.is_empty() {
            return Err(MatteError::invalid_config("backup tag must not be empty"));
        }
        if self
            .backup_tag
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '.' || c.is_whitespace())
        {
            return Err(MatteError::invalid_config(format!(
                "backup tag '{}' may not contain path separators, dots or whitespace",
                self.backup_tag
            )));
        }
        Ok(())
    }
}

/// Parameters for the threshold-based strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatteConfig {
    /// Brightness above which a pixel counts as background (0-255)
    pub threshold: u8,
    /// Closing iterations (dilations followed by as many erosions)
    pub close_iterations: u32,
    /// Opening iterations (erosions followed by as many dilations)
    pub open_iterations: u32,
    /// Side length of the square structuring element
    pub kernel_size: u32,
}

impl Default for MatteConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            close_iterations: 2,
            open_iterations: 1,
            kernel_size: 3,
        }
    }
}

impl MatteConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> MatteConfigBuilder {
        MatteConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Kernel size that is even or zero
    pub fn validate(&self) -> Result<()> {
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(MatteError::config_value_error(
                "kernel size",
                self.kernel_size,
                "odd values >= 1",
                Some(3),
            ));
        }
        Ok(())
    }
}

/// Builder for `MatteConfig`
#[derive(Debug, Default)]
pub struct MatteConfigBuilder {
    config: MatteConfig,
}

impl MatteConfigBuilder {
    #[must_use]
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.config.threshold = threshold;
        self
    }

    #[must_use]
    pub fn close_iterations(mut self, iterations: u32) -> Self {
        self.config.close_iterations = iterations;
        self
    }

    #[must_use]
    pub fn open_iterations(mut self, iterations: u32) -> Self {
        self.config.open_iterations = iterations;
        self
    }

    #[must_use]
    pub fn kernel_size(mut self, size: u32) -> Self {
        self.config.kernel_size = size;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Invalid kernel size
    pub fn build(self) -> Result<MatteConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
