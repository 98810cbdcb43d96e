//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::ImageReader` with guessed format |
//! | Resample | `image::imageops::resize` with the configured convolution filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//!
//! Output is always baseline JPEG in 8-bit RGB. Alpha is dropped, which is
//! the normalisation every upload target here expects.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{Quality, ResizeFilter};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

/// Container formats accepted on upload.
const ACCEPTED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(BackendError::Io)?;

        match reader.format() {
            Some(format) if ACCEPTED_FORMATS.contains(&format) => {}
            Some(format) => {
                return Err(BackendError::ProcessingFailed(format!(
                    "Unsupported input format: {format:?}"
                )));
            }
            None => {
                return Err(BackendError::ProcessingFailed(
                    "Unrecognised image data".into(),
                ));
            }
        }

        reader
            .decode()
            .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode: {e}")))
    }

    fn resample(
        &self,
        image: &DynamicImage,
        target: Dimensions,
        filter: ResizeFilter,
    ) -> Result<DynamicImage, BackendError> {
        if target.width == 0 || target.height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Cannot resample to {}x{}",
                target.width, target.height
            )));
        }
        Ok(image.resize_exact(target.width, target.height, filter.filter_type()))
    }

    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(BackendError::ProcessingFailed(
                "Cannot encode a zero-area image".into(),
            ));
        }
        let rgb = image.to_rgb8();
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality.value() as u8);
        rgb.write_with_encoder(encoder)
            .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))?;
        Ok(out)
    }
}
