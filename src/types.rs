//! Core types shared by strategies, the asset store and batch runs

use crate::error::{MatteError, Result};
use image::{Rgba, RgbaImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Foreground (opaque) mask value
pub const MASK_FOREGROUND: u8 = 255;

/// Background (transparent) mask value
pub const MASK_BACKGROUND: u8 = 0;

/// Single-channel matte with the same dimensions as its source image
///
/// Stored row-major as `[[y, x]]`. Thresholded strategies produce only
/// [`MASK_BACKGROUND`] and [`MASK_FOREGROUND`]; masks lifted from an external
/// segmentation result may carry any value in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Array2<u8>,
}

impl Mask {
    /// Create a mask of the given size filled with `value`
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            data: Array2::from_elem((height as usize, width as usize), value),
        }
    }

    /// Wrap an existing `[[y, x]]` array
    #[must_use]
    pub fn from_array(data: Array2<u8>) -> Self {
        Self { data }
    }

    /// Build a mask from row-major bytes
    pub fn from_vec(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let (width, height) = dimensions;
        let data = Array2::from_shape_vec((height as usize, width as usize), data).map_err(|e| {
            MatteError::invalid_config(format!(
                "mask data does not fit {}x{}: {}",
                width, height, e
            ))
        })?;
        Ok(Self { data })
    }

    /// Lift the alpha channel of an RGBA image into a mask
    #[must_use]
    pub fn from_alpha(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let data = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            image.get_pixel(x as u32, y as u32)[3]
        });
        Self { data }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    /// Mask dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Value at `(x, y)`, or `None` when out of bounds
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.data.get([y as usize, x as usize]).copied()
    }

    /// Set the value at `(x, y)`; out-of-bounds writes are ignored
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        if let Some(v) = self.data.get_mut([y as usize, x as usize]) {
            *v = value;
        }
    }

    /// Underlying `[[y, x]]` array
    #[must_use]
    pub fn data(&self) -> &Array2<u8> {
        &self.data
    }

    /// True when every value is either fully transparent or fully opaque
    #[must_use]
    pub fn is_binary(&self) -> bool {
        self.data
            .iter()
            .all(|&v| v == MASK_BACKGROUND || v == MASK_FOREGROUND)
    }

    /// Number of fully opaque samples
    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == MASK_FOREGROUND).count()
    }

    /// Combine this mask with the colour samples of `image`
    ///
    /// The output keeps the RGB of `image` and takes its alpha from the mask.
    /// The image crate hands out samples in RGBA order on both decode and
    /// encode, so no channel reorder happens here.
    pub fn apply_to(&self, image: &RgbaImage) -> Result<RgbaImage> {
        if image.dimensions() != self.dimensions() {
            return Err(MatteError::strategy_failed(format!(
                "mask is {}x{} but image is {}x{}",
                self.width(),
                self.height(),
                image.width(),
                image.height()
            )));
        }

        let mut result = RgbaImage::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            let alpha = self.get(x, y).unwrap_or(MASK_BACKGROUND);
            result.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
        }
        Ok(result)
    }
}

/// Lifecycle of an asset relative to one backup tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetState {
    /// Neither the current file nor the backup exists
    Missing,
    /// No backup has been taken yet
    Pristine,
    /// A backup exists and the current file still matches it byte for byte
    BackedUp,
    /// A backup exists and the current file has been transformed since
    Matted,
}

impl std::fmt::Display for AssetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Pristine => write!(f, "pristine"),
            Self::BackedUp => write!(f, "backed-up"),
            Self::Matted => write!(f, "matted"),
        }
    }
}
