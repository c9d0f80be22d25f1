//! Composition configuration.
//!
//! Handles loading, validating, and merging `canvas-fit.toml`. Every key is
//! optional: stock defaults are the base layer and a user file only overrides
//! what it names. Command-line flags are applied on top by the binary.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [container]
//! width = 1200
//! height = 600
//! # color = "1A2B3C"        # solid background, RRGGBB (leading '#' allowed)
//!
//! [foreground]
//! margin = 1.0              # fraction (0,1] or percentage (1,100]
//!
//! [background]
//! mode = "image"            # "image", "color" or "none"
//! blur_rounds = 8
//! # pixelate = [12, 12]
//!
//! [output]
//! format = "png"            # "png" or "jpg"
//! filter = "lanczos3"
//! header = false
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{BlockSize, MarginFraction, OutputFormat, ResampleFilter, Rgb, parse_hex_color};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
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

/// Everything a composition needs besides the source image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposeConfig {
    /// Canvas size and optional solid color.
    pub container: ContainerConfig,
    /// How the fitted foreground is sized.
    pub foreground: ForegroundConfig,
    /// What goes behind the foreground.
    pub background: BackgroundConfig,
    /// Encoding and resampling.
    pub output: OutputConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ComposeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container.width == 0 || self.container.height == 0 {
            return Err(ConfigError::Validation(
                "container.width and container.height must be positive".into(),
            ));
        }
        if self.background.blur_rounds < 0 {
            return Err(ConfigError::Validation(
                "background.blur_rounds must not be negative".into(),
            ));
        }
        if matches!(self.background.pixelate, Some([w, h]) if w == 0 || h == 0) {
            return Err(ConfigError::Validation(
                "background.pixelate values must be non-zero".into(),
            ));
        }
        if self.background.mode == BackgroundMode::Color && self.container.color.is_none() {
            return Err(ConfigError::Validation(
                "background.mode = \"color\" requires container.color".into(),
            ));
        }
        self.container.color()?;
        Ok(())
    }
}

/// Canvas settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    pub width: u32,
    pub height: u32,
    /// Solid background as `RRGGBB`, with or without a leading `#`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ContainerConfig {
    /// Parsed background color, if one is set.
    pub fn color(&self) -> Result<Option<Rgb>, ConfigError> {
        self.color
            .as_deref()
            .map(|hex| {
                parse_hex_color(hex.strip_prefix('#').unwrap_or(hex))
                    .map_err(|e| ConfigError::Validation(format!("container.color: {e}")))
            })
            .transpose()
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            color: None,
        }
    }
}

/// Foreground fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForegroundConfig {
    /// Raw margin; normalized by [`MarginFraction::normalize`].
    pub margin: f64,
}

impl ForegroundConfig {
    pub fn margin(&self) -> MarginFraction {
        MarginFraction::normalize(self.margin)
    }
}

impl Default for ForegroundConfig {
    fn default() -> Self {
        Self { margin: 1.0 }
    }
}

/// What fills the canvas behind the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// The source itself, scaled to cover the canvas, then filtered.
    #[default]
    Image,
    /// Only the container color.
    Color,
    /// Leave the canvas as allocated (black, or the container color if set).
    None,
}

/// Background settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
    pub mode: BackgroundMode,
    /// Gaussian blur passes over the filled background. 0 disables blurring.
    pub blur_rounds: i64,
    /// Pixelation block `[width, height]` applied after blurring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixelate: Option<[u32; 2]>,
}

impl BackgroundConfig {
    pub fn pixelate_block(&self) -> Option<BlockSize> {
        self.pixelate.map(|[width, height]| BlockSize { width, height })
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            mode: BackgroundMode::default(),
            blur_rounds: 8,
            pixelate: None,
        }
    }
}

/// Encoding and resampling settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub filter: ResampleFilter,
    /// Prefix stdout output with a `Content-Type` header.
    pub header: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers for batch runs.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ComposeConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config does not serialize: {e}")))
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

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ComposeConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ComposeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, merged over stock defaults and validated.
///
/// `None` yields the stock defaults.
pub fn load_config(path: Option<&Path>) -> Result<ComposeConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = match path {
        Some(p) => {
            let content = fs::read_to_string(p)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# canvas-fit configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Container (the output canvas)
# ---------------------------------------------------------------------------
[container]
width = 1200
height = 600

# Solid background color as RRGGBB. Painted before anything else.
# color = "1A2B3C"

# ---------------------------------------------------------------------------
# Foreground (the source, fitted inside the container)
# ---------------------------------------------------------------------------
[foreground]
# Shrink factor: a fraction in (0, 1] or a percentage in (1, 100].
# Anything else means no shrink.
margin = 1.0

# ---------------------------------------------------------------------------
# Background
# ---------------------------------------------------------------------------
[background]
# "image": the source scaled to cover the container, center-cropped, filtered
# "color": only container.color
# "none":  leave the canvas as allocated
mode = "image"

# Gaussian blur passes over the image background. 0 disables blurring.
blur_rounds = 8

# Pixelation block size [width, height], applied after blurring.
# pixelate = [12, 12]

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# "png" or "jpg"
format = "png"

# Resampling filter: "nearest", "triangle", "catmull-rom", "gaussian", "lanczos3"
filter = "lanczos3"

# When writing to stdout, prefix a Content-Type header and a blank line.
header = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
