//! High-level image operations.
//!
//! These functions combine the dimension calculations with backend execution:
//! resolve the output size, resample once, then run the quality search.
//!
//! ## Quality search
//!
//! Budgeted presets start at the requested quality and step down linearly
//! (default 5 points) until the encoded size fits the budget or the floor
//! (default 50) is reached. At the floor the result is returned even if it is
//! still over budget. A linear descent is used rather than a bisection: the
//! quality/size pair is close to monotonic, the number of steps is small
//! (`(start - floor) / step + 1`), and the order in which qualities are tried
//! is observable in the returned attempts.

use super::backend::{Dimensions, ImageBackend};
use super::calculations::{DEFAULT_MAX_CUSTOM_DIMENSION, resolve_dimensions};
use super::params::{Quality, QualitySearch, ResizeFilter};
use crate::error::CompressError;
use crate::preset::Preset;
use crate::types::{CompressedResult, CompressionRequest, EncodeAttempt, SourceImage};
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, CompressError>;

/// Knobs shared by every compression, normally taken from the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub search: QualitySearch,
    pub filter: ResizeFilter,
    pub max_custom_dimension: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            search: QualitySearch::default(),
            filter: ResizeFilter::default(),
            max_custom_dimension: DEFAULT_MAX_CUSTOM_DIMENSION,
        }
    }
}

/// Cooperative cancellation flag shared between a running job and whoever supersedes it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CompressError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run a full request: resolve dimensions, resample, and encode to the preset's budget.
pub fn compress(
    backend: &dyn ImageBackend,
    request: &CompressionRequest,
    settings: &EncodeSettings,
    cancel: &CancelToken,
) -> Result<CompressedResult> {
    let target = resolve_dimensions(
        request.source.dimensions(),
        &request.preset,
        request.custom_bounds,
        settings.max_custom_dimension,
    )?;
    encode_to_target(
        backend,
        &request.source,
        target,
        &request.preset,
        request.quality,
        settings,
        cancel,
    )
}

/// Resample `source` to `target` and encode it, searching for a quality that
/// fits `preset.byte_budget`.
///
/// Without a budget the image is encoded exactly once at `quality`. The output
/// is always re-encoded, even when no resize is needed and quality is 100.
/// The cancel token is checked before the resample and before every encode.
pub fn encode_to_target(
    backend: &dyn ImageBackend,
    source: &SourceImage,
    target: Dimensions,
    preset: &Preset,
    quality: Quality,
    settings: &EncodeSettings,
    cancel: &CancelToken,
) -> Result<CompressedResult> {
    if target.area() == 0 || source.dimensions().area() == 0 {
        return Err(CompressError::EncodeFailure(format!(
            "cannot encode {}x{} from a {}x{} source",
            target.width,
            target.height,
            source.dimensions().width,
            source.dimensions().height
        )));
    }

    cancel.check()?;
    let resampled = if target == source.dimensions() {
        Cow::Borrowed(source.bitmap())
    } else {
        Cow::Owned(
            backend
                .resample(source.bitmap(), target, settings.filter)
                .map_err(CompressError::encode)?,
        )
    };

    let mut quality = quality;
    let mut attempts = Vec::new();
    loop {
        cancel.check()?;
        let encoded = backend
            .encode(&resampled, quality)
            .map_err(CompressError::encode)?;
        if encoded.is_empty() {
            return Err(CompressError::EncodeFailure(format!(
                "encoder produced no output at quality {}",
                quality.value()
            )));
        }

        let byte_size = encoded.len() as u64;
        attempts.push(EncodeAttempt {
            quality: quality.value(),
            byte_size,
        });
        log::debug!(
            "{} {}x{} q{} → {} bytes (budget {:?})",
            preset.name,
            target.width,
            target.height,
            quality.value(),
            byte_size,
            preset.byte_budget
        );

        let within_budget = preset.byte_budget.is_none_or(|budget| byte_size <= budget);
        let next = if within_budget {
            None
        } else {
            settings.search.next(quality)
        };

        match next {
            Some(lower) => quality = lower,
            None => {
                return Ok(CompressedResult {
                    encoded_bytes: encoded,
                    width: target.width,
                    height: target.height,
                    byte_size,
                    quality_used: quality.value(),
                    met_budget: within_budget,
                    original_byte_size: source.original_byte_size(),
                    attempts,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::CustomBounds;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::preset::{PresetName, preset};
    use image::DynamicImage;

    const KB: usize = 1000;

    fn source(width: u32, height: u32) -> Arc<SourceImage> {
        Arc::new(SourceImage::new(DynamicImage::new_rgb8(width, height), 3_000_000))
    }

    fn budgeted(budget: u64) -> Preset {
        Preset {
            byte_budget: Some(budget),
            ..preset(PresetName::PlatformA)
        }
    }

    fn run(backend: &MockBackend, preset: &Preset, quality: u32) -> Result<CompressedResult> {
        encode_to_target(
            backend,
            &source(400, 300),
            Dimensions::new(200, 150),
            preset,
            Quality::new(quality),
            &EncodeSettings::default(),
            &CancelToken::new(),
        )
    }

    #[test]
    fn budget_met_on_third_step() {
        // 80 → 620KB, 75 → 560KB, 70 → 480KB: 70 is the first under 500KB.
        let backend = MockBackend::with_size_table(
            &[(80, 620 * KB), (75, 560 * KB), (70, 480 * KB), (65, 400 * KB)],
            1,
        );
        let result = run(&backend, &budgeted(500_000), 80).unwrap();

        assert_eq!(result.quality_used, 70);
        assert_eq!(result.byte_size, 480_000);
        assert!(result.met_budget);
        assert_eq!(backend.encoded_qualities(), vec![80, 75, 70]);
    }

    #[test]
    fn budget_met_immediately_encodes_once() {
        let backend = MockBackend::with_size_table(&[], 10 * KB);
        let result = run(&backend, &budgeted(500_000), 90).unwrap();
        assert_eq!(result.quality_used, 90);
        assert_eq!(result.attempts.len(), 1);
    }

    #[test]
    fn floor_returns_best_effort_over_budget() {
        let backend = MockBackend::with_sizes(|q, _| 900 * KB + q.value() as usize * KB);
        let result = run(&backend, &budgeted(500_000), 80).unwrap();

        assert_eq!(result.quality_used, 50);
        assert!(!result.met_budget);
        assert_eq!(result.byte_size, 950_000);
        assert_eq!(
            backend.encoded_qualities(),
            vec![80, 75, 70, 65, 60, 55, 50]
        );
    }

    #[test]
    fn sizes_are_non_increasing_during_descent() {
        let backend = MockBackend::new();
        // 200x150 at q → 300 * q bytes; budget forces a descent to 50.
        let result = run(&backend, &budgeted(1), 100).unwrap();
        let sizes: Vec<u64> = result.attempts.iter().map(|a| a.byte_size).collect();
        assert!(sizes.windows(2).all(|w| w[1] <= w[0]), "{sizes:?}");
        assert_eq!(result.attempts.last().unwrap().quality, 50);
        assert!(result.attempts.len() as u32 <= QualitySearch::default().max_attempts(Quality::MAX));
    }

    #[test]
    fn hint_below_floor_encodes_once() {
        let backend = MockBackend::with_size_table(&[], 900 * KB);
        let result = run(&backend, &budgeted(500_000), 30).unwrap();
        assert_eq!(result.quality_used, 30);
        assert_eq!(backend.encoded_qualities(), vec![30]);
    }

    #[test]
    fn unbounded_preset_encodes_once_at_hint() {
        let backend = MockBackend::with_size_table(&[], 50_000 * KB);
        let custom = preset(PresetName::Custom);
        let result = run(&backend, &custom, 65).unwrap();

        assert_eq!(result.quality_used, 65);
        assert!(result.met_budget);
        assert_eq!(backend.encoded_qualities(), vec![65]);
    }

    #[test]
    fn same_size_at_max_quality_still_encodes() {
        let backend = MockBackend::new();
        let src = source(120, 90);
        let result = encode_to_target(
            &backend,
            &src,
            Dimensions::new(120, 90),
            &preset(PresetName::Custom),
            Quality::MAX,
            &EncodeSettings::default(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(result.dimensions(), Dimensions::new(120, 90));
        assert!(!result.encoded_bytes.is_empty());
        // No resample needed, but the encode still runs.
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Encode {
                width: 120,
                height: 90,
                quality: 100
            }]
        );
    }

    #[test]
    fn resample_runs_once_with_configured_filter() {
        let backend = MockBackend::with_sizes(|_, _| 2_000 * KB);
        let settings = EncodeSettings {
            filter: ResizeFilter::CatmullRom,
            ..EncodeSettings::default()
        };
        encode_to_target(
            &backend,
            &source(400, 300),
            Dimensions::new(200, 150),
            &budgeted(500_000),
            Quality::new(60),
            &settings,
            &CancelToken::new(),
        )
        .unwrap();

        let resamples: Vec<_> = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Resample { .. }))
            .collect();
        assert_eq!(
            resamples,
            vec![RecordedOp::Resample {
                width: 200,
                height: 150,
                filter: ResizeFilter::CatmullRom
            }]
        );
    }

    #[test]
    fn encoder_failure_is_typed() {
        let backend = MockBackend::new().failing_encode();
        let err = run(&backend, &budgeted(500_000), 80).unwrap_err();
        assert!(matches!(err, CompressError::EncodeFailure(_)));
    }

    #[test]
    fn empty_output_is_an_encode_failure() {
        let backend = MockBackend::with_size_table(&[], 0);
        let err = run(&backend, &budgeted(500_000), 80).unwrap_err();
        assert!(matches!(err, CompressError::EncodeFailure(_)));
    }

    #[test]
    fn cancelled_before_start_does_no_work() {
        let backend = MockBackend::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = encode_to_target(
            &backend,
            &source(400, 300),
            Dimensions::new(200, 150),
            &budgeted(1),
            Quality::new(80),
            &EncodeSettings::default(),
            &cancel,
        )
        .unwrap_err();

        assert_eq!(err, CompressError::Cancelled);
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn cancellation_is_checked_between_attempts() {
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        // Cancel from inside the codec after the second encode.
        let calls = std::sync::atomic::AtomicU32::new(0);
        let backend = MockBackend::with_sizes(move |_, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                trip.cancel();
            }
            2_000 * KB
        });

        let err = encode_to_target(
            &backend,
            &source(400, 300),
            Dimensions::new(200, 150),
            &budgeted(500_000),
            Quality::new(80),
            &EncodeSettings::default(),
            &cancel,
        )
        .unwrap_err();

        assert_eq!(err, CompressError::Cancelled);
        assert_eq!(backend.encoded_qualities(), vec![80, 75]);
    }

    #[test]
    fn compress_resolves_then_encodes() {
        let backend = MockBackend::with_size_table(&[], 100 * KB);
        let request = CompressionRequest::new(
            source(4000, 3000),
            preset(PresetName::PlatformA),
            Quality::new(80),
            None,
        );
        let result = compress(
            &backend,
            &request,
            &EncodeSettings::default(),
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(result.dimensions(), Dimensions::new(2000, 1500));
        assert_eq!(result.original_byte_size, 3_000_000);
    }

    #[test]
    fn compress_banner_is_exact() {
        let backend = MockBackend::with_size_table(&[], 100 * KB);
        let request = CompressionRequest::new(
            source(500, 500),
            preset(PresetName::FixedBanner),
            Quality::new(80),
            None,
        );
        let result = compress(
            &backend,
            &request,
            &EncodeSettings::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(result.dimensions(), Dimensions::new(1584, 396));
    }

    #[test]
    fn compress_invalid_bounds_never_touches_backend() {
        let backend = MockBackend::new();
        let request = CompressionRequest::new(
            source(400, 300),
            preset(PresetName::Custom),
            Quality::new(80),
            Some(CustomBounds::new(100, 9000)),
        );
        let err = compress(
            &backend,
            &request,
            &EncodeSettings::default(),
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, CompressError::InvalidBounds(_)));
        assert!(backend.get_operations().is_empty());
    }
}
