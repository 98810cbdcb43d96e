//! # Preset Compress
//!
//! Resizes and re-encodes photos to fit the dimension and file-size limits of
//! a fixed set of publishing targets. Pick a preset, load an image, and the
//! latest edit always wins: rapid quality or size changes collapse into one
//! compression, and a slow stale job can never overwrite a newer result.
//!
//! # Architecture: Request → Resolve → Search → Publish
//!
//! ```text
//! 1. Request   preset + quality + bounds  →  CompressionRequest  (validated synchronously)
//! 2. Resolve   source size + preset       →  target dimensions   (pure arithmetic)
//! 3. Search    resample once, re-encode   →  CompressedResult    (quality descent to the budget)
//! 4. Publish   sequence check             →  ResultSlot + event  (stale results dropped)
//! ```
//!
//! Stages 2 and 3 are plain functions over an [`imaging::ImageBackend`], so
//! they are unit tested against a mock that synthesizes encoded sizes.
//! Stage 4 lives in [`orchestrator`] and is the only stateful part.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`preset`] | The preset registry: bounds, byte budget and resize policy per target |
//! | [`imaging`] | Dimension math, quality search, the backend trait and the `image`-crate backend |
//! | [`types`] | `SourceImage`, `CompressionRequest`, `CompressedResult` |
//! | [`error`] | `CompressError`, the user-facing failure taxonomy |
//! | [`orchestrator`] | Sequencing, debounce, cancellation and the worker pool |
//! | [`config`] | `preset-compress.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Linear Quality Descent
//!
//! The encoder steps quality down by a fixed amount until the output fits or
//! the floor is reached. Encoded size is monotone in quality for practical
//! purposes, and the default range (80 down to 50 in steps of 5) is at most
//! seven encodes, so a bisection would save little and make the chosen quality
//! harder to predict from the settings.
//!
//! ## Best Effort at the Floor
//!
//! When even the floor quality misses the budget, the floor encode is still
//! published with `met_budget = false`. Showing the user the closest achievable
//! output is more useful than an error they cannot act on except by changing
//! the preset.
//!
//! ## Decimal Budgets
//!
//! Budgets use 1 KB = 1000 bytes, as upload limits are usually stated.

pub mod config;
pub mod error;
pub mod imaging;
pub mod orchestrator;
pub mod output;
pub mod preset;
pub mod types;
