//! Image processing: pure Rust, no system codecs.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG) |
//! | **Resolve dimensions** | [`resolve_dimensions`]: fit within bounds or exact resize |
//! | **Resample** | `image` convolution filters (Lanczos3 by default) |
//! | **Encode** | `JpegEncoder` with a linear quality search toward the byte budget |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Quality, search and filter settings
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: The quality-target encoder combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{
    CustomBounds, DEFAULT_MAX_CUSTOM_DIMENSION, fit_within_bounds, preset_bounds,
    resolve_dimensions,
};
pub use operations::{CancelToken, EncodeSettings, compress, encode_to_target};
pub use params::{Quality, QualitySearch, ResizeFilter};
pub use rust_backend::RustBackend;
