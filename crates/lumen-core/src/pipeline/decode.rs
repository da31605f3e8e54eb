//! In-memory image loading with content-based format detection.

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};
use std::io::Cursor;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Loads client-supplied bytes into a decoded image.
///
/// No resizing, color conversion or EXIF orientation is applied here; the
/// tagger engine owns all normalization.
#[derive(Debug, Clone, Copy)]
pub struct ImageLoader {
    max_dimension: u32,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(&LimitsConfig::default())
    }
}

/// Result of loading an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Format detected from the content
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageLoader {
    /// Create a loader enforcing `limits`.
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_dimension: limits.max_image_dimension,
        }
    }

    /// Largest width or height this loader accepts.
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Decode `bytes` into an image.
    ///
    /// The container format is sniffed from the leading bytes. Unknown
    /// containers fail with `UnsupportedFormat`; truncated or corrupt data
    /// fails with `Decode`. Dimensions are read from the header first, so an
    /// oversized image fails with `ImageTooLarge` before any pixel buffer is
    /// allocated.
    pub fn load(&self, bytes: &[u8]) -> Result<DecodedImage, PipelineError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                message: format!("Cannot detect image format: {e}"),
            })?;
        let format = reader.format().ok_or(PipelineError::UnsupportedFormat)?;

        let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(|e| PipelineError::Decode {
                message: e.to_string(),
            })?;
        self.check_dimensions(width, height)?;

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        reader.limits(limits);

        let image = reader.decode().map_err(|e| PipelineError::Decode {
            message: e.to_string(),
        })?;

        // Headers can lie; trust the decoded buffer.
        let (width, height) = image.dimensions();
        self.check_dimensions(width, height)?;
        Ok(DecodedImage {
            image,
            format,
            width,
            height,
        })
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<(), PipelineError> {
        if width > self.max_dimension || height > self.max_dimension {
            return Err(PipelineError::ImageTooLarge {
                width,
                height,
                max_dim: self.max_dimension,
            });
        }
        Ok(())
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Ico => "ico",
        ImageFormat::Pnm => "pnm",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
}
