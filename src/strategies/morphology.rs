//! Luma threshold matte cleaned up with morphological closing and opening
//!
//! The structuring element is a square of side `kernel_size`. Windows are
//! clipped at the image border, so neighbours outside the image take no part
//! in the min/max and edges are neither eroded nor dilated artificially.

use super::MatteStrategy;
use crate::{
    config::{MatteConfig, StrategyDescriptor},
    error::Result,
    types::{Mask, MASK_BACKGROUND, MASK_FOREGROUND},
};
use image::{DynamicImage, RgbaImage};
use ndarray::{s, Array2};
use tracing::{debug, instrument, span, Level};

/// Rec.601 luma of an RGB sample in 14-bit fixed point
#[inline]
#[must_use]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let weighted = u32::from(r) * 4899 + u32::from(g) * 9617 + u32::from(b) * 1868 + 8192;
    (weighted >> 14) as u8
}

/// Inverted binary threshold on luma: bright pixels become background
#[must_use]
pub fn threshold_inverted(image: &RgbaImage, threshold: u8) -> Mask {
    let (width, height) = image.dimensions();
    let data = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        let p = image.get_pixel(x as u32, y as u32);
        if luma(p[0], p[1], p[2]) > threshold {
            MASK_BACKGROUND
        } else {
            MASK_FOREGROUND
        }
    });
    Mask::from_array(data)
}

fn sweep(mask: &Mask, kernel_size: u32, pick: fn(u8, u8) -> u8, init: u8) -> Mask {
    let radius = (kernel_size / 2) as usize;
    let src = mask.data();
    let (rows, cols) = src.dim();

    let data = Array2::from_shape_fn((rows, cols), |(y, x)| {
        let y0 = y.saturating_sub(radius);
        let x0 = x.saturating_sub(radius);
        let y1 = (y + radius + 1).min(rows);
        let x1 = (x + radius + 1).min(cols);
        src.slice(s![y0..y1, x0..x1]).iter().copied().fold(init, pick)
    });
    Mask::from_array(data)
}

/// One dilation pass (window maximum)
#[must_use]
pub fn dilate(mask: &Mask, kernel_size: u32) -> Mask {
    sweep(mask, kernel_size, u8::max, u8::MIN)
}

/// One erosion pass (window minimum)
#[must_use]
pub fn erode(mask: &Mask, kernel_size: u32) -> Mask {
    sweep(mask, kernel_size, u8::min, u8::MAX)
}

/// Closing: `iterations` dilations followed by as many erosions
#[must_use]
pub fn close(mask: &Mask, kernel_size: u32, iterations: u32) -> Mask {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = dilate(&out, kernel_size);
    }
    for _ in 0..iterations {
        out = erode(&out, kernel_size);
    }
    out
}

/// Opening: `iterations` erosions followed by as many dilations
#[must_use]
pub fn open(mask: &Mask, kernel_size: u32, iterations: u32) -> Mask {
    let mut out = mask.clone();
    for _ in 0..iterations {
        out = erode(&out, kernel_size);
    }
    for _ in 0..iterations {
        out = dilate(&out, kernel_size);
    }
    out
}

/// Hard matte from a luma threshold followed by closing and opening
#[derive(Debug, Clone)]
pub struct MorphologicalThresholdStrategy {
    descriptor: StrategyDescriptor,
    config: MatteConfig,
}

impl MorphologicalThresholdStrategy {
    #[must_use]
    pub fn new(descriptor: StrategyDescriptor, config: MatteConfig) -> Self {
        Self { descriptor, config }
    }

    #[must_use]
    pub fn config(&self) -> &MatteConfig {
        &self.config
    }

    /// Compute the final binary mask for `image`
    #[must_use]
    pub fn compute_mask(&self, image: &RgbaImage) -> Mask {
        let cfg = &self.config;

        let mask = {
            let _span = span!(Level::DEBUG, "threshold", threshold = cfg.threshold).entered();
            threshold_inverted(image, cfg.threshold)
        };
        let mask = {
            let _span = span!(Level::DEBUG, "closing", iterations = cfg.close_iterations).entered();
            close(&mask, cfg.kernel_size, cfg.close_iterations)
        };
        let mask = {
            let _span = span!(Level::DEBUG, "opening", iterations = cfg.open_iterations).entered();
            open(&mask, cfg.kernel_size, cfg.open_iterations)
        };

        debug!(
            foreground = mask.foreground_count(),
            total = image.width() as usize * image.height() as usize,
            "Mask computed"
        );
        mask
    }
}

impl MatteStrategy for MorphologicalThresholdStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    #[instrument(
        skip(self, image),
        fields(dimensions = %format!("{}x{}", image.width(), image.height()))
    )]
    fn apply(&self, image: &DynamicImage) -> Result<RgbaImage> {
        // Source alpha is discarded; the mask alone decides opacity
        let rgba = image.to_rgba8();
        let mask = self.compute_mask(&rgba);
        mask.apply_to(&rgba)
    }
}
