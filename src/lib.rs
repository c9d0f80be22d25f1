//! # canvas-fit
//!
//! Fits arbitrary images onto fixed-size canvases. The source keeps its aspect
//! ratio and is centered over a background that is either a solid color or the
//! source itself, scaled to cover the canvas and blurred.
//!
//! ```text
//! ┌──────────────────────────────┐
//! │░░░░░░░┌──────────────┐░░░░░░░│  ░ blurred fill of the source
//! │░░░░░░░│              │░░░░░░░│
//! │░░░░░░░│   fitted     │░░░░░░░│
//! │░░░░░░░│   source     │░░░░░░░│
//! │░░░░░░░└──────────────┘░░░░░░░│
//! └──────────────────────────────┘
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry (fit, fill, centering), the raster backend boundary and the operations built on it |
//! | [`compose`] | The end-to-end pipeline: decode, container, background, filter, fit, combine, encode |
//! | [`config`] | `canvas-fit.toml` loading, validation and merging over stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Closed-Form Geometry
//!
//! Fitting and filling are computed directly from the source and container
//! sizes, then applied with a single resample. Sizes stay fractional until the
//! last step, so no rounding error accumulates and an image is never scaled
//! twice.
//!
//! ## Backend Boundary
//!
//! All pixel work goes through the [`imaging::RasterBackend`] trait. Geometry
//! and pipeline logic are tested against a recording mock; the `image`-crate
//! implementation, [`imaging::RustBackend`], is exercised by the integration
//! tests.
//!
//! ## Explicit Ownership
//!
//! A decoded [`imaging::SourceImage`] is never modified. Every resize returns a
//! new buffer, and only operations that say so write into an existing one.

pub mod compose;
pub mod config;
pub mod imaging;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
