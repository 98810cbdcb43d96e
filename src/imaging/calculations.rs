//! Pure calculation functions for output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use crate::error::CompressError;
use crate::preset::{Preset, ResizePolicy};

/// Hard cap on either axis of user-supplied bounds.
pub const DEFAULT_MAX_CUSTOM_DIMENSION: u32 = 8000;

/// User-supplied bounds for the `custom` preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomBounds {
    pub width: u32,
    pub height: u32,
}

impl CustomBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse the raw text of the width/height fields.
    ///
    /// Rejects empty, signed, zero and non-integral values (`"12.5"`).
    /// The upper cap is checked later by [`preset_bounds`], since it is configurable.
    pub fn parse(width: &str, height: &str) -> Result<Self, CompressError> {
        Ok(Self {
            width: parse_axis("width", width)?,
            height: parse_axis("height", height)?,
        })
    }

    fn validate(&self, max_dimension: u32) -> Result<Dimensions, CompressError> {
        for (axis, value) in [("width", self.width), ("height", self.height)] {
            if value == 0 {
                return Err(CompressError::InvalidBounds(format!(
                    "{axis} must be positive"
                )));
            }
            if value > max_dimension {
                return Err(CompressError::InvalidBounds(format!(
                    "{axis} {value} exceeds the {max_dimension}px maximum"
                )));
            }
        }
        Ok(Dimensions::new(self.width, self.height))
    }
}

fn parse_axis(axis: &str, raw: &str) -> Result<u32, CompressError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(CompressError::InvalidBounds(format!("{axis} is required")));
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CompressError::InvalidBounds(format!(
            "{axis} must be a whole number of pixels, got {text:?}"
        )));
    }
    let value: u32 = text.parse().map_err(|_| {
        CompressError::InvalidBounds(format!("{axis} {text} is out of range"))
    })?;
    if value == 0 {
        return Err(CompressError::InvalidBounds(format!(
            "{axis} must be positive"
        )));
    }
    Ok(value)
}

/// Scale `source` down to fit inside `bounds`, preserving aspect ratio.
///
/// The scale factor is clamped to 1.0 so images already inside the bounds are
/// never upscaled. Each axis is rounded half away from zero and clamped to at
/// least one pixel.
///
/// # Examples
/// ```
/// # use preset_compress::imaging::{fit_within_bounds, Dimensions};
/// // 4000x3000 into 2000x2000 → 2000x1500
/// assert_eq!(
///     fit_within_bounds(Dimensions::new(4000, 3000), Dimensions::new(2000, 2000)),
///     Dimensions::new(2000, 1500)
/// );
///
/// // 800x600 into 2000x2000 → untouched
/// assert_eq!(
///     fit_within_bounds(Dimensions::new(800, 600), Dimensions::new(2000, 2000)),
///     Dimensions::new(800, 600)
/// );
/// ```
pub fn fit_within_bounds(source: Dimensions, bounds: Dimensions) -> Dimensions {
    let (src_w, src_h) = (source.width as f64, source.height as f64);
    let ratio = (bounds.width as f64 / src_w)
        .min(bounds.height as f64 / src_h)
        .min(1.0);

    // f64::round is half-away-from-zero.
    let width = ((src_w * ratio).round() as u32).clamp(1, bounds.width.max(1));
    let height = ((src_h * ratio).round() as u32).clamp(1, bounds.height.max(1));
    Dimensions::new(width, height)
}

/// The bounds a request resizes against: the preset's own, or the validated custom ones.
///
/// Needs no source image, so callers can reject bad bounds before any decode or encode.
pub fn preset_bounds(
    preset: &Preset,
    custom_bounds: Option<CustomBounds>,
    max_custom_dimension: u32,
) -> Result<Dimensions, CompressError> {
    match preset.bounds {
        Some(bounds) => Ok(bounds),
        None => custom_bounds
            .ok_or_else(|| {
                CompressError::InvalidBounds(format!(
                    "preset {} needs a width and height",
                    preset.name
                ))
            })?
            .validate(max_custom_dimension),
    }
}

/// Compute the output dimensions for a source image under a preset.
///
/// `custom_bounds` is required for the custom preset and ignored otherwise.
/// Fails with `InvalidBounds` when custom bounds are missing, zero, or larger
/// than `max_custom_dimension`, and with `EncodeFailure` for a zero-area source.
pub fn resolve_dimensions(
    source: Dimensions,
    preset: &Preset,
    custom_bounds: Option<CustomBounds>,
    max_custom_dimension: u32,
) -> Result<Dimensions, CompressError> {
    let bounds = preset_bounds(preset, custom_bounds, max_custom_dimension)?;

    match preset.policy {
        ResizePolicy::ExactResize => Ok(bounds),
        ResizePolicy::FitWithinBounds => {
            if source.width == 0 || source.height == 0 {
                return Err(CompressError::EncodeFailure(format!(
                    "source image has zero area ({}x{})",
                    source.width, source.height
                )));
            }
            Ok(fit_within_bounds(source, bounds))
        }
    }
}
