//! Image fitting and compositing.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory_with_format` (PNG, JPEG) |
//! | **Fit** (contain) | [`fit_extent`] + `image::imageops::resize` |
//! | **Fill** (cover) | [`fill_window`] + crop + resize of the visible window |
//! | **Combine** | [`centered_offset`] + `image::imageops::overlay` |
//! | **Blur / pixelate** | `image::imageops::blur`, block averaging |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`RasterBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Decoded, Dimensions, RasterBackend};
pub use calculations::{
    Extent, MarginFraction, Orientation, centered_offset, centered_placement, fill_dimensions,
    fill_window, fit_extent, parse_hex_color, resize_extent,
};
pub use operations::{
    Canvas, SourceImage, blur, combine, fill, fit, fit_dimensions, pixelate, render, resize,
    resize_buffer,
};
pub use params::{
    BlockSize, CopyRegion, OutputFormat, Placement, ResampleFilter, ResizeMode, Rgb, SourceFormat,
};
pub use rust_backend::RustBackend;
