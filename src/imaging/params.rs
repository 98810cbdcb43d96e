//! Parameter types for image operations.
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`QualitySearch`]: Linear descent settings for budgeted encodes (step + floor).
//! - [`ResizeFilter`]: Interpolation filter used when resampling. Nearest-neighbour
//!   is not representable: it aliases badly on downscaled product photos.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Quality(u32);

impl Quality {
    pub const MAX: Quality = Quality(100);

    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Settings for the budgeted quality search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySearch {
    /// Points subtracted after each attempt that overshoots the budget.
    pub step: u32,
    /// Lowest quality tried; the result at the floor is returned even if over budget.
    pub floor: Quality,
}

impl QualitySearch {
    /// The quality that follows `current` in the descent, or `None` once the floor is reached.
    pub fn next(&self, current: Quality) -> Option<Quality> {
        if current <= self.floor {
            return None;
        }
        let lowered = current.value().saturating_sub(self.step.max(1));
        Some(Quality::new(lowered.max(self.floor.value())))
    }

    /// Upper bound on the number of encodes a search starting at `start` can run.
    pub fn max_attempts(&self, start: Quality) -> u32 {
        let span = start.value().saturating_sub(self.floor.value());
        span.div_ceil(self.step.max(1)) + 1
    }
}

impl Default for QualitySearch {
    fn default() -> Self {
        Self {
            step: 5,
            floor: Quality(50),
        }
    }
}

/// Resampling filter. All variants are area-aware convolution filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    #[default]
    Lanczos3,
    CatmullRom,
    Gaussian,
    Triangle,
}

impl ResizeFilter {
    pub fn filter_type(self) -> FilterType {
        match self {
            Self::Lanczos3 => FilterType::Lanczos3,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Triangle => FilterType::Triangle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_80() {
        assert_eq!(Quality::default().value(), 80);
    }

    #[test]
    fn search_descends_by_step_to_floor() {
        let search = QualitySearch::default();
        let mut seq = vec![Quality::new(80)];
        while let Some(q) = search.next(*seq.last().unwrap()) {
            seq.push(q);
        }
        let values: Vec<u32> = seq.iter().map(|q| q.value()).collect();
        assert_eq!(values, vec![80, 75, 70, 65, 60, 55, 50]);
        assert_eq!(search.max_attempts(Quality::new(80)), 7);
    }

    #[test]
    fn search_clamps_last_step_to_floor() {
        let search = QualitySearch::default();
        assert_eq!(search.next(Quality::new(52)), Some(Quality::new(50)));
        assert_eq!(search.next(Quality::new(50)), None);
    }

    #[test]
    fn search_starting_below_floor_stops_immediately() {
        let search = QualitySearch::default();
        assert_eq!(search.next(Quality::new(30)), None);
        assert_eq!(search.max_attempts(Quality::new(30)), 1);
    }

    #[test]
    fn zero_step_still_makes_progress() {
        let search = QualitySearch {
            step: 0,
            floor: Quality::new(50),
        };
        assert_eq!(search.next(Quality::new(60)), Some(Quality::new(59)));
    }

    #[test]
    fn filter_parses_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            filter: ResizeFilter,
        }
        let w: Wrapper = toml::from_str("filter = \"catmull-rom\"").unwrap();
        assert_eq!(w.filter, ResizeFilter::CatmullRom);
        assert!(toml::from_str::<Wrapper>("filter = \"nearest\"").is_err());
    }

    #[test]
    fn filters_map_to_convolution_kernels() {
        assert_eq!(ResizeFilter::default().filter_type(), FilterType::Lanczos3);
        assert_eq!(ResizeFilter::Triangle.filter_type(), FilterType::Triangle);
    }
}
