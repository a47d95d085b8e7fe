//! Per-pixel brightness threshold matte

use super::MatteStrategy;
use crate::{config::StrategyDescriptor, error::Result};
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::instrument;

/// Transparent white written over background pixels
const CLEARED: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// Clears every pixel whose R, G and B all exceed the threshold
///
/// Pixels that stay keep their colour and their existing alpha (255 for
/// sources without an alpha channel). Anti-aliased edges that are only partly
/// bright are left opaque.
#[derive(Debug, Clone)]
pub struct PixelThresholdStrategy {
    descriptor: StrategyDescriptor,
    threshold: u8,
}

impl PixelThresholdStrategy {
    #[must_use]
    pub fn new(descriptor: StrategyDescriptor, threshold: u8) -> Self {
        Self {
            descriptor,
            threshold,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// True when the pixel counts as background
    #[inline]
    #[must_use]
    pub fn is_background(&self, pixel: &Rgba<u8>) -> bool {
        pixel[0] > self.threshold && pixel[1] > self.threshold && pixel[2] > self.threshold
    }
}

impl MatteStrategy for PixelThresholdStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self, image), fields(threshold = self.threshold))]
    fn apply(&self, image: &DynamicImage) -> Result<RgbaImage> {
        let mut rgba = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            if self.is_background(pixel) {
                *pixel = CLEARED;
            }
        }
        Ok(rgba)
    }
}
