//! Value types that flow through the compression pipeline.
//!
//! A [`SourceImage`] is decoded once per upload and shared by reference
//! (`Arc`) with every request made against it; nothing mutates it. Requests
//! and results are short-lived values, one per orchestration cycle.

use crate::error::CompressError;
use crate::imaging::{CustomBounds, Dimensions, ImageBackend, Quality};
use crate::preset::{self, Preset};
use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;

/// An immutable decoded bitmap plus the size of the file it came from.
#[derive(Debug)]
pub struct SourceImage {
    bitmap: DynamicImage,
    original_byte_size: u64,
}

impl SourceImage {
    pub fn new(bitmap: DynamicImage, original_byte_size: u64) -> Self {
        Self {
            bitmap,
            original_byte_size,
        }
    }

    /// Decode uploaded container bytes through the backend.
    pub fn decode(backend: &dyn ImageBackend, bytes: &[u8]) -> Result<Arc<Self>, CompressError> {
        let bitmap = backend.decode(bytes).map_err(CompressError::decode)?;
        Ok(Arc::new(Self::new(bitmap, bytes.len() as u64)))
    }

    pub fn bitmap(&self) -> &DynamicImage {
        &self.bitmap
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.bitmap)
    }

    pub fn original_byte_size(&self) -> u64 {
        self.original_byte_size
    }
}

/// One user-triggered compression: the image, the target and the quality hint.
#[derive(Debug, Clone)]
pub struct CompressionRequest {
    pub source: Arc<SourceImage>,
    pub preset: Preset,
    pub quality: Quality,
    /// Required iff `preset` is custom; ignored otherwise.
    pub custom_bounds: Option<CustomBounds>,
}

impl CompressionRequest {
    pub fn new(
        source: Arc<SourceImage>,
        preset: Preset,
        quality: Quality,
        custom_bounds: Option<CustomBounds>,
    ) -> Self {
        Self {
            source,
            preset,
            quality,
            custom_bounds,
        }
    }

    /// Build a request from a preset name, failing with `UnknownPreset` on a miss.
    pub fn named(
        source: Arc<SourceImage>,
        preset_name: &str,
        quality: Quality,
        custom_bounds: Option<CustomBounds>,
    ) -> Result<Self, CompressError> {
        let preset = preset::lookup(preset_name)?;
        Ok(Self::new(source, preset, quality, custom_bounds))
    }
}

/// One encode performed by the quality search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodeAttempt {
    pub quality: u32,
    pub byte_size: u64,
}

/// The encoded output of a satisfied request.
#[derive(Debug, Clone, Serialize)]
pub struct CompressedResult {
    #[serde(skip)]
    pub encoded_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub quality_used: u32,
    /// Whether `byte_size` is within the preset budget (always true when unbudgeted).
    pub met_budget: bool,
    pub original_byte_size: u64,
    pub attempts: Vec<EncodeAttempt>,
}

impl CompressedResult {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Fraction of the original file size saved, negative when the output grew.
    pub fn savings_ratio(&self) -> f64 {
        if self.original_byte_size == 0 {
            return 0.0;
        }
        1.0 - self.byte_size as f64 / self.original_byte_size as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;

    #[test]
    fn decode_keeps_original_size() {
        let backend = MockBackend::new().with_decoded(Dimensions::new(640, 480));
        let source = SourceImage::decode(&backend, &[0; 1234]).unwrap();
        assert_eq!(source.dimensions(), Dimensions::new(640, 480));
        assert_eq!(source.original_byte_size(), 1234);
    }

    #[test]
    fn decode_failure_is_typed() {
        let backend = MockBackend::new();
        let err = SourceImage::decode(&backend, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, CompressError::DecodeFailure(_)));
    }

    #[test]
    fn named_request_rejects_unknown_preset() {
        let source = Arc::new(SourceImage::new(DynamicImage::new_rgb8(4, 4), 10));
        let err = CompressionRequest::named(source.clone(), "poster", Quality::default(), None)
            .unwrap_err();
        assert_eq!(err, CompressError::UnknownPreset("poster".into()));

        let req = CompressionRequest::named(source, "platformB", Quality::new(70), None).unwrap();
        assert_eq!(req.preset.name.as_str(), "platformB");
        assert_eq!(req.quality.value(), 70);
    }

    #[test]
    fn savings_ratio() {
        let result = CompressedResult {
            encoded_bytes: Vec::new(),
            width: 1,
            height: 1,
            byte_size: 250,
            quality_used: 80,
            met_budget: true,
            original_byte_size: 1000,
            attempts: Vec::new(),
        };
        assert!((result.savings_ratio() - 0.75).abs() < f64::EPSILON);
    }
}
