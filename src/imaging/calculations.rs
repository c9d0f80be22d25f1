//! Pure calculation functions for fitting geometry.
//!
//! All functions here are pure and testable without any buffers or I/O.
//! Geometry is computed in `f64` and only rounded to pixels by
//! [`Extent::to_pixels`], at the point where a backend has to allocate.

use super::backend::{BackendError, Dimensions};
use super::params::{Placement, ResizeMode, Rgb};

/// Fractional width/height used while computing geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Round to whole pixels.
    ///
    /// Fails with [`BackendError::DegenerateGeometry`] if either side is not
    /// finite or rounds below one pixel.
    pub fn to_pixels(self) -> Result<Dimensions, BackendError> {
        let round = |v: f64| -> Option<u32> {
            let r = v.round();
            (r.is_finite() && r >= 1.0 && r <= u32::MAX as f64).then_some(r as u32)
        };
        match (round(self.width), round(self.height)) {
            (Some(width), Some(height)) => Ok(Dimensions { width, height }),
            _ => Err(BackendError::DegenerateGeometry {
                width: self.width,
                height: self.height,
            }),
        }
    }

    /// Round to whole pixels, keeping any positive side at least one pixel wide.
    ///
    /// For sizes derived from a real source, where a sliver of a very long or
    /// very thin image must still be drawn. Sides that are zero, negative or
    /// not finite still fail with [`BackendError::DegenerateGeometry`].
    ///
    /// ```
    /// # use canvas_fit::imaging::{Dimensions, Extent};
    /// let px = Extent::new(0.3, 600.0).to_visible_pixels().unwrap();
    /// assert_eq!(px, Dimensions { width: 1, height: 600 });
    /// assert!(Extent::new(0.0, 600.0).to_visible_pixels().is_err());
    /// ```
    pub fn to_visible_pixels(self) -> Result<Dimensions, BackendError> {
        let lift = |v: f64| if v > 0.0 && v < 1.0 { 1.0 } else { v };
        Extent::new(lift(self.width), lift(self.height))
            .to_pixels()
            .map_err(|_| BackendError::DegenerateGeometry {
                width: self.width,
                height: self.height,
            })
    }
}

impl From<Dimensions> for Extent {
    fn from(d: Dimensions) -> Self {
        Self::new(d.width as f64, d.height as f64)
    }
}

/// Normalized shrink factor in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginFraction(f64);

impl MarginFraction {
    /// No shrink.
    pub const FULL: Self = Self(1.0);

    /// Normalize a raw margin.
    ///
    /// - `0 < v <= 1` is a fraction and is kept as-is.
    /// - `1 < v <= 100` is a percentage and is divided by 100.
    /// - Anything else (non-positive, NaN, above 100) means no shrink.
    ///
    /// ```
    /// # use canvas_fit::imaging::MarginFraction;
    /// assert_eq!(MarginFraction::normalize(0.9).value(), 0.9);
    /// assert_eq!(MarginFraction::normalize(90.0).value(), 0.9);
    /// assert_eq!(MarginFraction::normalize(-3.0).value(), 1.0);
    /// ```
    pub fn normalize(raw: f64) -> Self {
        if raw > 0.0 && raw <= 1.0 {
            Self(raw)
        } else if raw > 1.0 && raw <= 100.0 {
            Self(raw / 100.0)
        } else {
            Self::FULL
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for MarginFraction {
    fn default() -> Self {
        Self::FULL
    }
}

/// Container orientation, decided per fitting call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Width strictly greater than height.
    Wide,
    TallOrSquare,
}

impl Orientation {
    pub fn of(container: Dimensions) -> Self {
        if container.width > container.height {
            Self::Wide
        } else {
            Self::TallOrSquare
        }
    }
}

fn ensure_positive(d: Dimensions) -> Result<(), BackendError> {
    if d.width == 0 || d.height == 0 {
        return Err(BackendError::DegenerateGeometry {
            width: d.width as f64,
            height: d.height as f64,
        });
    }
    Ok(())
}

/// Compute the output extent of a resize request.
///
/// `Exact` returns the request unchanged; the lock modes derive the free axis
/// from the source's own ratio.
pub fn resize_extent(
    source: Dimensions,
    new_width: f64,
    new_height: f64,
    mode: ResizeMode,
) -> Result<Extent, BackendError> {
    if source.width == 0 || source.height == 0 {
        return Err(BackendError::DegenerateSource {
            width: source.width,
            height: source.height,
        });
    }
    let (sw, sh) = (source.width as f64, source.height as f64);
    Ok(match mode {
        ResizeMode::Exact => Extent::new(new_width, new_height),
        ResizeMode::LockHeight => {
            let ratio = new_height / sh;
            Extent::new(sw * ratio, new_height)
        }
        ResizeMode::LockWidth => {
            let ratio = new_width / sw;
            Extent::new(new_width, sh * ratio)
        }
    })
}

/// Compute the size a source takes when fitted inside a container.
///
/// The height is clamped first, against the source and the container. Its
/// scale then bounds the width, and each axis is finally rescaled by the other
/// axis's ratio. That cross-coupling is what keeps the result at the source's
/// aspect ratio.
///
/// In a tall or square container the width bounds also carry the margin.
///
/// The result never exceeds the source or the container on either axis.
///
/// # Examples
/// ```
/// # use canvas_fit::imaging::{fit_extent, Dimensions, MarginFraction};
/// let src = Dimensions { width: 800, height: 600 };
/// let container = Dimensions { width: 1200, height: 600 };
/// let e = fit_extent(src, container, MarginFraction::FULL).unwrap();
/// assert_eq!((e.width, e.height), (800.0, 600.0));
/// ```
pub fn fit_extent(
    source: Dimensions,
    container: Dimensions,
    margin: MarginFraction,
) -> Result<Extent, BackendError> {
    ensure_positive(source)?;
    ensure_positive(container)?;

    let m = margin.value();
    let (rw, rh) = (source.width as f64, source.height as f64);
    let (cw, ch) = (container.width as f64, container.height as f64);

    let target_height = (rh * m).min(rh).min(ch);
    let ratio = target_height / rh;

    let target_width = match Orientation::of(container) {
        Orientation::Wide => (rw * m).min(rw / ratio).min(cw / ratio),
        Orientation::TallOrSquare => (rw * m).min(rw * m / ratio).min(cw * m / ratio),
    };
    let ratio2 = target_width / rw;

    Ok(Extent::new(target_width * ratio, target_height * ratio2))
}

/// Compute the size a source must be scaled to so it covers a container.
///
/// Scales up by the larger of the two axis ratios; a source that already covers
/// the container is left at its native size. Both sides are at least the
/// container's after rounding.
///
/// # Examples
/// ```
/// # use canvas_fit::imaging::{fill_dimensions, Dimensions};
/// let src = Dimensions { width: 400, height: 300 };
/// let container = Dimensions { width: 1200, height: 600 };
/// assert_eq!(
///     fill_dimensions(src, container).unwrap(),
///     Dimensions { width: 1200, height: 900 }
/// );
/// ```
pub fn fill_dimensions(
    source: Dimensions,
    container: Dimensions,
) -> Result<Dimensions, BackendError> {
    ensure_positive(source)?;
    ensure_positive(container)?;

    let (rw, rh) = (source.width as f64, source.height as f64);
    let (cw, ch) = (container.width as f64, container.height as f64);
    let scale = (cw / rw).max(ch / rh).max(1.0);

    let scaled = Extent::new(rw * scale, rh * scale).to_pixels()?;
    Ok(Dimensions {
        width: scaled.width.max(container.width),
        height: scaled.height.max(container.height),
    })
}

/// Region of the source that stays visible after a fill.
///
/// The fill scales the source by `max(1, cw/rw, ch/rh)` and crops the center
/// of the result. This is the same window expressed in source pixels: the
/// container divided by that scale, centered on the source and clamped to it.
/// Only this window needs to be resampled.
///
/// # Examples
/// ```
/// # use canvas_fit::imaging::{fill_window, Dimensions, Placement};
/// // a tall strip only shows a short band out of its middle
/// let src = Dimensions { width: 100, height: 3000 };
/// let container = Dimensions { width: 1200, height: 600 };
/// assert_eq!(
///     fill_window(src, container).unwrap(),
///     Placement { x: 0, y: 1475, width: 100, height: 50 }
/// );
/// ```
pub fn fill_window(source: Dimensions, container: Dimensions) -> Result<Placement, BackendError> {
    ensure_positive(source)?;
    ensure_positive(container)?;

    let (rw, rh) = (source.width as f64, source.height as f64);
    let (cw, ch) = (container.width as f64, container.height as f64);
    let scale = (cw / rw).max(ch / rh).max(1.0);

    let window = Extent::new(cw / scale, ch / scale).to_visible_pixels()?;
    let window = Dimensions {
        width: window.width.min(source.width),
        height: window.height.min(source.height),
    };
    let (x, y) = centered_offset(source, window);
    Ok(Placement {
        x,
        y,
        width: window.width,
        height: window.height,
    })
}

/// Offset that centers `inner` inside `outer`.
///
/// Negative when `inner` is larger; halves round toward negative infinity.
pub fn centered_offset(outer: Dimensions, inner: Dimensions) -> (i64, i64) {
    let x = (outer.width as i64 - inner.width as i64).div_euclid(2);
    let y = (outer.height as i64 - inner.height as i64).div_euclid(2);
    (x, y)
}

/// Centered placement of `inner` on `outer`.
pub fn centered_placement(outer: Dimensions, inner: Dimensions) -> Placement {
    let (x, y) = centered_offset(outer, inner);
    Placement {
        x,
        y,
        width: inner.width,
        height: inner.height,
    }
}

/// Parse a 6-digit hex color (`RRGGBB`).
///
/// Every character must be a hex digit; case does not matter. No `#` prefix.
///
/// ```
/// # use canvas_fit::imaging::{parse_hex_color, Rgb};
/// assert_eq!(parse_hex_color("1A2B3C").unwrap(), Rgb::new(26, 43, 60));
/// assert!(parse_hex_color("1A2B3").is_err());
/// ```
pub fn parse_hex_color(hex: &str) -> Result<Rgb, BackendError> {
    let invalid = || BackendError::InvalidColor(hex.to_string());
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}
