//! External segmentation delegate
//!
//! The core holds no algorithm here. A [`SegmentationService`] takes a raw
//! image and returns one carrying a continuous alpha estimate; the strategy
//! only checks the contract and maps every failure to `StrategyFailed`.

use super::MatteStrategy;
use crate::{
    config::StrategyDescriptor,
    error::{MatteError, Result},
    services::ImageIOService,
    types::Mask,
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use std::{process::Command, sync::Arc};
use tracing::{debug, info, instrument};

/// Placeholder replaced by the temporary input path
pub const INPUT_PLACEHOLDER: &str = "{input}";
/// Placeholder replaced by the temporary output path
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Command line used when none is configured
pub const DEFAULT_SEGMENTER_COMMAND: &str = "rembg i {input} {output}";

/// Synchronous image-in / image-with-alpha-out segmentation
pub trait SegmentationService: Send + Sync {
    /// Short name used in logs and error messages
    fn name(&self) -> &str;

    /// Segment `image`, returning it with a per-pixel alpha estimate
    ///
    /// # Errors
    /// - `StrategyFailed` when the service is unavailable or inference fails
    fn segment(&self, image: &DynamicImage) -> Result<RgbaImage>;
}

/// Strategy that delegates the matte to a [`SegmentationService`]
pub struct ExternalSegmentationStrategy {
    descriptor: StrategyDescriptor,
    service: Arc<dyn SegmentationService>,
}

impl ExternalSegmentationStrategy {
    #[must_use]
    pub fn new(descriptor: StrategyDescriptor, service: Arc<dyn SegmentationService>) -> Self {
        Self {
            descriptor,
            service,
        }
    }
}

impl std::fmt::Debug for ExternalSegmentationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalSegmentationStrategy")
            .field("descriptor", &self.descriptor)
            .field("service", &self.service.name())
            .finish()
    }
}

impl MatteStrategy for ExternalSegmentationStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self, image), fields(service = %self.service.name()))]
    fn apply(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let result = self.service.segment(image).map_err(|e| match e {
            MatteError::StrategyFailed(_) => e,
            other => MatteError::strategy_failed(format!(
                "{} failed: {}",
                self.service.name(),
                other
            )),
        })?;

        let expected = (image.width(), image.height());
        if result.dimensions() != expected {
            return Err(MatteError::strategy_failed(format!(
                "{} returned {}x{} for a {}x{} input",
                self.service.name(),
                result.width(),
                result.height(),
                expected.0,
                expected.1
            )));
        }

        let matte = Mask::from_alpha(&result);
        debug!(
            hard = matte.is_binary(),
            opaque = matte.foreground_count(),
            "Segmentation matte received"
        );
        Ok(result)
    }
}

/// Runs an external program through temporary PNG files
///
/// Arguments containing `{input}` / `{output}` have those placeholders
/// replaced by the paths of the temporary input and output images.
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    program: String,
    args: Vec<String>,
}

impl CommandSegmenter {
    /// Create a segmenter from a program and its argument template
    ///
    /// # Errors
    /// - `InvalidConfig` when no argument references `{output}`
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Result<Self> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(MatteError::invalid_config("segmenter program must not be empty"));
        }
        if !args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            return Err(MatteError::invalid_config(format!(
                "segmenter arguments must reference {} (got: {:?})",
                OUTPUT_PLACEHOLDER, args
            )));
        }
        Ok(Self { program, args })
    }

    /// Parse a whitespace-separated command line such as `rembg i {input} {output}`
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| MatteError::invalid_config("segmenter command is empty"))?;
        Self::new(program, parts.collect())
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn expand_args(&self, input: &str, output: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace(INPUT_PLACEHOLDER, input)
                    .replace(OUTPUT_PLACEHOLDER, output)
            })
            .collect()
    }
}

impl SegmentationService for CommandSegmenter {
    fn name(&self) -> &str {
        &self.program
    }

    fn segment(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let scratch = tempfile::tempdir().map_err(|e| {
            MatteError::strategy_failed(format!("cannot create scratch directory: {}", e))
        })?;
        let input = scratch.path().join("input.png");
        let output = scratch.path().join("output.png");

        ImageIOService::save_png(&image.to_rgba8(), &input).map_err(|e| {
            MatteError::strategy_failed(format!("cannot stage segmenter input: {}", e))
        })?;

        let args = self.expand_args(&input.to_string_lossy(), &output.to_string_lossy());
        debug!(program = %self.program, ?args, "Running segmenter");

        let start = Instant::now();
        let run = Command::new(&self.program).args(&args).output().map_err(|e| {
            MatteError::strategy_failed(format!(
                "segmentation service '{}' unavailable: {}",
                self.program, e
            ))
        })?;

        if !run.status.success() {
            let stderr = String::from_utf8_lossy(&run.stderr);
            return Err(MatteError::strategy_failed(format!(
                "'{}' exited with {}: {}",
                self.program,
                run.status,
                stderr.trim()
            )));
        }

        let segmented = ImageIOService::load_image(&output).map_err(|e| {
            MatteError::strategy_failed(format!(
                "'{}' produced no usable output: {}",
                self.program, e
            ))
        })?;

        info!(
            program = %self.program,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Segmentation complete"
        );
        Ok(segmented.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyKind;
    use crate::strategies::test_utils::MockSegmenter;
    use image::Rgba;

    fn descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(StrategyKind::ExternalSegmentation)
    }

    #[test]
    fn test_strategy_passes_soft_alpha_through() {
        let mock = Arc::new(MockSegmenter::new());
        let strategy = ExternalSegmentationStrategy::new(descriptor(), mock.clone());
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(6, 4, Rgba([1, 2, 3, 255])));

        let result = strategy.apply(&image).unwrap();
        assert_eq!(result.dimensions(), (6, 4));
        assert!(result.pixels().any(|p| p[3] > 0 && p[3] < 255));
        assert_eq!(mock.get_call_history(), vec!["segment 6x4".to_string()]);
    }

    #[test]
    fn test_strategy_maps_service_errors_to_strategy_failed() {
        let strategy =
            ExternalSegmentationStrategy::new(descriptor(), Arc::new(MockSegmenter::new_failing()));
        let image = DynamicImage::new_rgba8(2, 2);
        let err = strategy.apply(&image).unwrap_err();
        assert!(matches!(err, MatteError::StrategyFailed(_)));

        let strategy = ExternalSegmentationStrategy::new(
            descriptor(),
            Arc::new(MockSegmenter::new_failing_decode()),
        );
        let err = strategy.apply(&image).unwrap_err();
        assert!(matches!(err, MatteError::StrategyFailed(_)));
        assert!(err.to_string().contains("mock decode failure"));
    }

    #[test]
    fn test_strategy_rejects_resized_output() {
        let strategy = ExternalSegmentationStrategy::new(
            descriptor(),
            Arc::new(MockSegmenter::new().with_output_size(3, 3)),
        );
        let err = strategy.apply(&DynamicImage::new_rgba8(5, 5)).unwrap_err();
        assert!(err.to_string().contains("3x3"));
    }

    #[test]
    fn test_command_line_parsing() {
        let segmenter = CommandSegmenter::from_command_line(DEFAULT_SEGMENTER_COMMAND).unwrap();
        assert_eq!(segmenter.program(), "rembg");
        assert_eq!(
            segmenter.expand_args("/tmp/a.png", "/tmp/b.png"),
            vec!["i", "/tmp/a.png", "/tmp/b.png"]
        );

        assert!(CommandSegmenter::from_command_line("").is_err());
        assert!(CommandSegmenter::from_command_line("rembg i {input}").is_err());
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let segmenter =
            CommandSegmenter::from_command_line("card-matte-no-such-segmenter {input} {output}")
                .unwrap();
        let err = segmenter.segment(&DynamicImage::new_rgba8(2, 2)).unwrap_err();
        assert!(matches!(err, MatteError::StrategyFailed(_)));
        assert!(err.to_string().contains("unavailable"));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_segmenter_round_trip() {
        let segmenter = CommandSegmenter::from_command_line("cp {input} {output}").unwrap();
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(1, 1, Rgba([9, 8, 7, 100]));

        let result = segmenter
            .segment(&DynamicImage::ImageRgba8(image.clone()))
            .unwrap();
        assert_eq!(result, image);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_segmenter_failure_exit() {
        let segmenter = CommandSegmenter::from_command_line("false {input} {output}").unwrap();
        let err = segmenter.segment(&DynamicImage::new_rgba8(2, 2)).unwrap_err();
        assert!(err.to_string().contains("exited"));
    }
}
