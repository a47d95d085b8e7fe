//! Decoding, encoding and writing of card images
//!
//! Decoding falls back to content sniffing when an asset's extension lies.
//! Output is limited to lossless formats that keep alpha, and every matte is
//! decoded back from its encoded bytes before it may replace an asset.

use crate::error::{MatteError, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// # Returns
    /// * `Ok(DynamicImage)` - Successfully loaded image
    /// * `Err(MatteError::MissingAsset)` - No file at `path`
    /// * `Err(MatteError::Decode)` - File exists but is not a readable raster image
    ///
    /// # Examples
    /// ```rust,no_run
    /// use card_matte::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("assets/cards/fish_origami.png")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.is_file() {
            return Err(MatteError::missing_asset(format!(
                "file does not exist: {}",
                path_ref.display()
            )));
        }

        // First try extension-based format detection
        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref)
                    .map_err(|io_err| MatteError::file_io_error("read image data", path_ref, &io_err))?;

                image::load_from_memory(&data)
                    .map_err(|content_err| MatteError::decode_error_at(path_ref, &content_err))
            },
        }
    }

    /// Load an image from bytes
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| MatteError::decode(format!("Failed to decode image from bytes: {}", e)))
    }

    /// Lossless, alpha-capable output format for a file extension
    ///
    /// # Errors
    /// - `InvalidConfig` for lossy or alpha-less formats
    pub fn output_format_for(extension: &str) -> Result<ImageFormat> {
        match extension.to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "tif" | "tiff" => Ok(ImageFormat::Tiff),
            #[cfg(feature = "webp-support")]
            "webp" => Ok(ImageFormat::WebP),
            other => Err(MatteError::invalid_config(format!(
                "'{}' cannot hold a lossless alpha matte (use png or tiff)",
                other
            ))),
        }
    }

    /// Encode an RGBA image in `format`
    pub fn encode(image: &RgbaImage, format: ImageFormat) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        image
            .write_to(&mut cursor, format)
            .map_err(|e| MatteError::write(format!("Failed to encode {:?}: {}", format, e)))?;
        Ok(buffer)
    }

    /// Encode an RGBA image as PNG bytes
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        Self::encode(image, ImageFormat::Png)
    }

    /// Check that encoded output decodes to an alpha-carrying image of `dimensions`
    ///
    /// # Errors
    /// - `StrategyFailed` when the bytes do not decode, lack alpha, or have the
    ///   wrong size
    pub fn validate_matte_output(bytes: &[u8], dimensions: (u32, u32)) -> Result<()> {
        let decoded = image::load_from_memory(bytes).map_err(|e| {
            MatteError::strategy_failed(format!("output does not decode: {}", e))
        })?;

        if !decoded.color().has_alpha() {
            return Err(MatteError::strategy_failed(format!(
                "output has no alpha channel (color type {:?})",
                decoded.color()
            )));
        }

        let actual = (decoded.width(), decoded.height());
        if actual != dimensions {
            return Err(MatteError::strategy_failed(format!(
                "output is {}x{} but input was {}x{}",
                actual.0, actual.1, dimensions.0, dimensions.1
            )));
        }

        Ok(())
    }

    /// Overwrite `path` with `bytes`
    ///
    /// # Errors
    /// - `Write` when the file cannot be written
    pub fn write_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path_ref = path.as_ref();
        std::fs::write(path_ref, bytes).map_err(|e| {
            MatteError::write(format!("Failed to write '{}': {}", path_ref.display(), e))
        })
    }

    /// Encode `image` as PNG and write it to `path`
    pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let bytes = Self::encode_png(image)?;
        Self::write_bytes(path, &bytes)
    }
}
