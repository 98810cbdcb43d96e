//! Error taxonomy for the compression pipeline.
//!
//! | Variant | Detected | Surfaced to the user |
//! |---|---|---|
//! | [`CompressError::UnknownPreset`] | synchronously, on request construction | yes |
//! | [`CompressError::InvalidBounds`] | synchronously, before any encode | yes |
//! | [`CompressError::NoSourceImage`] | synchronously, on submit while idle | yes |
//! | [`CompressError::SourceLoading`] | synchronously, on an edit while an upload is decoding | yes |
//! | [`CompressError::DecodeFailure`] | asynchronously, on the worker | yes |
//! | [`CompressError::EncodeFailure`] | asynchronously, on the worker | yes |
//! | [`CompressError::Cancelled`] | asynchronously, between search steps | no |
//!
//! None of them disturb the last published result.

use crate::imaging::BackendError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressError {
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
    #[error("No source image loaded")]
    NoSourceImage,
    #[error("Source image is still loading")]
    SourceLoading,
    #[error("Decode failed: {0}")]
    DecodeFailure(String),
    #[error("Encode failed: {0}")]
    EncodeFailure(String),
    #[error("Request superseded")]
    Cancelled,
}

impl CompressError {
    /// Cancellation is the normal outcome of a superseded request, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn decode(err: BackendError) -> Self {
        Self::DecodeFailure(err.to_string())
    }

    pub(crate) fn encode(err: BackendError) -> Self {
        Self::EncodeFailure(err.to_string())
    }
}
