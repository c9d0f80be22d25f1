//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how*. They are the vocabulary shared
//! by the pure [`calculations`](super::calculations), the high-level
//! [`operations`](super::operations) and the [`backend`](super::backend) that
//! performs the pixel work.
//!
//! ## Types
//!
//! - [`Rgb`]: 3-byte background color.
//! - [`ResizeMode`]: exact (distorting) resize or single-axis aspect lock.
//! - [`OutputFormat`]: encode target; unknown selectors fall back to PNG.
//! - [`SourceFormat`]: what the decoder recognised (PNG or JPEG).
//! - [`ResampleFilter`]: interpolation kernel used by the backend when scaling.
//! - [`BlockSize`]: pixelation block dimensions.
//! - [`CopyRegion`]: source rectangle + destination offset for region copies.
//! - [`Placement`]: where a layer ended up on a canvas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Solid color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// How a resize treats the requested width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Scale to exactly the requested size, distorting if the ratios disagree.
    #[default]
    Exact,
    /// Height drives the scale; the requested width is ignored.
    LockHeight,
    /// Width drives the scale; the requested height is ignored.
    LockWidth,
}

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    #[serde(alias = "jpeg")]
    Jpg,
}

impl OutputFormat {
    /// Map a user-supplied selector to a format. Anything unrecognised is PNG.
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpg,
            _ => Self::Png,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }
}

/// Formats the decode boundary accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Png,
    Jpeg,
}

impl SourceFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Interpolation kernel for scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

/// Pixelation block size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSize {
    pub width: u32,
    pub height: u32,
}

/// Rectangle copy: `width × height` pixels starting at `(src_x, src_y)` in the
/// source land at `(dst_x, dst_y)` in the destination.
///
/// Offsets may be negative; whatever falls outside either buffer is clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    pub dst_x: i64,
    pub dst_y: i64,
    pub src_x: i64,
    pub src_y: i64,
    pub width: u32,
    pub height: u32,
}

/// Position and size of a layer placed on a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}
