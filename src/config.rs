//! Compressor configuration module.
//!
//! Handles loading, validating, and merging `preset-compress.toml`. The file
//! is optional and sparse: stock defaults are overridden by whatever keys the
//! user sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [encoder]
//! default_quality = 80      # Initial quality hint (1-100)
//! quality_step = 5          # Points removed per over-budget attempt
//! quality_floor = 50        # Lowest quality the search will try
//! filter = "lanczos3"       # lanczos3 | catmull-rom | gaussian | triangle
//!
//! [limits]
//! max_custom_dimension = 8000  # Cap on each axis of custom bounds
//!
//! [orchestrator]
//! debounce_ms = 1000        # Quiet period before quality/size edits recompress
//! workers = 2               # Threads available to in-flight compressions
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{
    DEFAULT_MAX_CUSTOM_DIMENSION, EncodeSettings, Quality, QualitySearch, ResizeFilter,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `preset-compress.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressorConfig {
    /// Quality search and resampling settings.
    pub encoder: EncoderConfig,
    /// Bounds accepted for the custom preset.
    pub limits: LimitsConfig,
    /// Request scheduling settings.
    pub orchestrator: OrchestratorConfig,
}

impl CompressorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let encoder = &self.encoder;
        for (key, value) in [
            ("encoder.default_quality", encoder.default_quality),
            ("encoder.quality_floor", encoder.quality_floor),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!("{key} must be 1-100")));
            }
        }
        if encoder.quality_step == 0 {
            return Err(ConfigError::Validation(
                "encoder.quality_step must be positive".into(),
            ));
        }
        if encoder.quality_floor > encoder.default_quality {
            return Err(ConfigError::Validation(
                "encoder.quality_floor must not exceed encoder.default_quality".into(),
            ));
        }
        if self.limits.max_custom_dimension == 0 {
            return Err(ConfigError::Validation(
                "limits.max_custom_dimension must be positive".into(),
            ));
        }
        if self.orchestrator.workers == 0 {
            return Err(ConfigError::Validation(
                "orchestrator.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            search: QualitySearch {
                step: self.encoder.quality_step,
                floor: Quality::new(self.encoder.quality_floor),
            },
            filter: self.encoder.filter,
            max_custom_dimension: self.limits.max_custom_dimension,
        }
    }

    pub fn default_quality(&self) -> Quality {
        Quality::new(self.encoder.default_quality)
    }
}

/// Quality search and resampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    pub default_quality: u32,
    pub quality_step: u32,
    pub quality_floor: u32,
    pub filter: ResizeFilter,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        let search = QualitySearch::default();
        Self {
            default_quality: Quality::default().value(),
            quality_step: search.step,
            quality_floor: search.floor.value(),
            filter: ResizeFilter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_custom_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_custom_dimension: DEFAULT_MAX_CUSTOM_DIMENSION,
        }
    }
}

/// Request scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Quiet period, in milliseconds, that debounced edits wait for.
    pub debounce_ms: u64,
    /// Worker threads. A superseded job may still be winding down while the
    /// newest one runs, so more than one is useful even though only one
    /// result is ever kept.
    pub workers: usize,
}

impl OrchestratorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            workers: 2,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(CompressorConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CompressorConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CompressorConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is missing.
pub fn load_config(path: &Path) -> Result<CompressorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# preset-compress configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Encoder
# ---------------------------------------------------------------------------
[encoder]
# Quality hint used when none is given on the command line (1-100).
default_quality = 80

# Budgeted presets re-encode at decreasing quality until the output fits.
# Each over-budget attempt lowers quality by this many points...
quality_step = 5

# ...and the search stops here, returning its best effort even if too large.
quality_floor = 50

# Resampling filter: lanczos3, catmull-rom, gaussian or triangle.
filter = "lanczos3"

# ---------------------------------------------------------------------------
# Limits
# ---------------------------------------------------------------------------
[limits]
# Largest width or height accepted for the custom preset, in pixels.
max_custom_dimension = 8000

# ---------------------------------------------------------------------------
# Orchestrator
# ---------------------------------------------------------------------------
[orchestrator]
# Quality and size edits wait this long (ms) for the user to stop typing.
debounce_ms = 1000

# Worker threads for compression jobs.
workers = 2
"##
}
