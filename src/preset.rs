//! Platform preset registry.
//!
//! A closed table of named upload targets. Each entry fixes the pixel bounds,
//! an optional byte budget and the resize policy; `custom` takes its bounds
//! from the request instead and never has a budget.
//!
//! | Name | Bounds | Budget | Policy |
//! |---|---|---|---|
//! | `platformA` | 2000 × 2000 | 1 MB | fit within |
//! | `platformB` | 1600 × 1600 | 500 KB | fit within |
//! | `fixedBanner` | 1584 × 396 | 3 MB | exact |
//! | `custom` | per request | none | fit within |

use crate::error::CompressError;
use crate::imaging::Dimensions;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const KB: u64 = 1000;
const MB: u64 = 1000 * KB;

/// How resolved output dimensions relate to the preset bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizePolicy {
    /// Scale down only, preserving aspect ratio.
    FitWithinBounds,
    /// Force the output to exactly the bounds, ignoring source aspect ratio.
    ExactResize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PresetName {
    #[serde(rename = "platformA")]
    PlatformA,
    #[serde(rename = "platformB")]
    PlatformB,
    #[serde(rename = "fixedBanner")]
    FixedBanner,
    #[serde(rename = "custom")]
    Custom,
}

impl PresetName {
    pub const ALL: [PresetName; 4] = [
        PresetName::PlatformA,
        PresetName::PlatformB,
        PresetName::FixedBanner,
        PresetName::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlatformA => "platformA",
            Self::PlatformB => "platformB",
            Self::FixedBanner => "fixedBanner",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for PresetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetName {
    type Err = CompressError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let wanted = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CompressError::UnknownPreset(wanted.to_string()))
    }
}

/// One row of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: PresetName,
    pub label: &'static str,
    /// `None` only for [`PresetName::Custom`], whose bounds arrive with the request.
    pub bounds: Option<Dimensions>,
    /// Byte-size ceiling for the encoded output. `None` means encode once, no search.
    pub byte_budget: Option<u64>,
    pub policy: ResizePolicy,
}

impl Preset {
    pub fn is_custom(&self) -> bool {
        self.name == PresetName::Custom
    }
}

/// Return the registry entry for a preset name.
pub fn preset(name: PresetName) -> Preset {
    match name {
        PresetName::PlatformA => Preset {
            name,
            label: "Marketplace listing photo",
            bounds: Some(Dimensions::new(2000, 2000)),
            byte_budget: Some(MB),
            policy: ResizePolicy::FitWithinBounds,
        },
        PresetName::PlatformB => Preset {
            name,
            label: "Storefront product photo",
            bounds: Some(Dimensions::new(1600, 1600)),
            byte_budget: Some(500 * KB),
            policy: ResizePolicy::FitWithinBounds,
        },
        PresetName::FixedBanner => Preset {
            name,
            label: "Profile banner",
            bounds: Some(Dimensions::new(1584, 396)),
            byte_budget: Some(3 * MB),
            policy: ResizePolicy::ExactResize,
        },
        PresetName::Custom => Preset {
            name,
            label: "Custom dimensions",
            bounds: None,
            byte_budget: None,
            policy: ResizePolicy::FitWithinBounds,
        },
    }
}

/// Look a preset up by its textual name.
///
/// ```
/// # use preset_compress::preset::{lookup, ResizePolicy};
/// let banner = lookup("fixedBanner").unwrap();
/// assert_eq!(banner.policy, ResizePolicy::ExactResize);
/// assert!(lookup("poster").is_err());
/// ```
pub fn lookup(name: &str) -> Result<Preset, CompressError> {
    name.parse().map(preset)
}

/// Every preset, in display order.
pub fn all() -> Vec<Preset> {
    PresetName::ALL.into_iter().map(preset).collect()
}
