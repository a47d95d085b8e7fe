//! Test utilities and a mock segmentation service
//!
//! `MockSegmenter` stands in for an external segmentation program so the
//! delegate strategy and batch runs can be tested without spawning anything.

use super::SegmentationService;
use crate::error::{MatteError, Result};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    None,
    Strategy,
    Decode,
}

/// Mock segmentation service for testing
#[derive(Debug, Clone)]
pub struct MockSegmenter {
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    failure: FailureMode,
    /// Force the output to this size instead of the input's
    output_size: Option<(u32, u32)>,
}

impl MockSegmenter {
    /// Create a mock that returns a horizontal alpha ramp
    #[must_use]
    pub fn new() -> Self {
        Self {
            call_history: Arc::new(Mutex::new(Vec::new())),
            failure: FailureMode::None,
            output_size: None,
        }
    }

    /// Create a mock whose every call fails with `StrategyFailed`
    #[must_use]
    pub fn new_failing() -> Self {
        let mut mock = Self::new();
        mock.failure = FailureMode::Strategy;
        mock
    }

    /// Create a mock whose every call fails with a decode error
    #[must_use]
    pub fn new_failing_decode() -> Self {
        let mut mock = Self::new();
        mock.failure = FailureMode::Decode;
        mock
    }

    /// Return images of a fixed size regardless of input
    #[must_use]
    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_size = Some((width, height));
        self
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn record_call(&self, call: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
    }
}

impl Default for MockSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentationService for MockSegmenter {
    fn name(&self) -> &str {
        "mock-segmenter"
    }

    fn segment(&self, image: &DynamicImage) -> Result<RgbaImage> {
        self.record_call(format!("segment {}x{}", image.width(), image.height()));

        match self.failure {
            FailureMode::Strategy => {
                return Err(MatteError::strategy_failed("mock segmentation failure"))
            },
            FailureMode::Decode => return Err(MatteError::decode("mock decode failure")),
            FailureMode::None => {},
        }

        let mut rgba = image.to_rgba8();
        if let Some((width, height)) = self.output_size {
            rgba = imageops::resize(&rgba, width, height, imageops::FilterType::Nearest);
        }

        let span = rgba.width().saturating_sub(1).max(1);
        for (x, _, pixel) in rgba.enumerate_pixels_mut() {
            let alpha = (x.min(span) * 255 / span) as u8;
            *pixel = Rgba([pixel[0], pixel[1], pixel[2], alpha]);
        }
        Ok(rgba)
    }
}
