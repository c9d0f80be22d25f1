//! Shared test utilities for the canvas-fit test suite.
//!
//! Builds small synthetic images in memory so tests never depend on fixture
//! files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = solid_png(64, 48, [10, 20, 30]);
//! let pattern = test_pattern(8, 8);
//! ```

use image::{ImageEncoder, Rgba, RgbaImage};

/// A gradient with a distinct color per pixel (for checking where pixels land).
pub fn test_pattern(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 17 % 256) as u8, (y * 31 % 256) as u8, 128, 255])
    })
}

/// Encode a solid-color PNG.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]));
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    bytes
}

/// Encode a solid-color JPEG.
pub fn solid_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let raw: Vec<u8> = std::iter::repeat_n(rgb, (width * height) as usize)
        .flatten()
        .collect();
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut bytes)
        .write_image(&raw, width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}
