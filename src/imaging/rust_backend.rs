//! Pure Rust raster backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Primitive | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG) | `image::guess_format` + `image::load_from_memory_with_format` |
//! | Scale | `image::imageops::resize` with the configured filter |
//! | Crop | `image::imageops::crop_imm` |
//! | Copy region | `image::imageops::crop_imm` + `image::imageops::overlay` |
//! | Gaussian blur pass | `image::imageops::blur` with a small sigma (≈ 3x3 kernel) |
//! | Pixelate | block averaging over the RGBA buffer |
//! | Encode → PNG / JPEG | `ImageBuffer::write_to` |
//!
//! Every buffer is an [`RgbaImage`]; JPEG output drops the alpha channel.

use super::backend::{BackendError, Decoded, Dimensions, RasterBackend};
use super::params::{
    BlockSize, CopyRegion, OutputFormat, Placement, ResampleFilter, Rgb, SourceFormat,
};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use tracing::trace;

/// Sigma whose gaussian roughly matches a 1-2-1 3x3 kernel.
const GAUSSIAN_SIGMA: f32 = 0.85;

/// Backend over [`RgbaImage`] buffers.
///
/// See the [module docs](self) for the crate-to-primitive mapping.
pub struct RustBackend {
    filter: ResampleFilter,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::with_filter(ResampleFilter::default())
    }

    /// Backend that scales with the given interpolation kernel.
    pub fn with_filter(filter: ResampleFilter) -> Self {
        Self { filter }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_type(filter: ResampleFilter) -> FilterType {
    match filter {
        ResampleFilter::Nearest => FilterType::Nearest,
        ResampleFilter::Triangle => FilterType::Triangle,
        ResampleFilter::CatmullRom => FilterType::CatmullRom,
        ResampleFilter::Gaussian => FilterType::Gaussian,
        ResampleFilter::Lanczos3 => FilterType::Lanczos3,
    }
}

fn ensure_nonempty(buffer: &RgbaImage, what: &str) -> Result<(), BackendError> {
    if buffer.width() == 0 || buffer.height() == 0 {
        return Err(BackendError::InvalidBuffer(format!("{what} buffer is empty")));
    }
    Ok(())
}

/// Clip a copy region against both buffers.
///
/// Returns `(src_x, src_y, dst_x, dst_y, width, height)` in buffer coordinates,
/// or `None` when nothing overlaps.
fn clip_region(
    region: CopyRegion,
    source: Dimensions,
    dest: Dimensions,
) -> Option<(u32, u32, i64, i64, u32, u32)> {
    let (mut sx, mut sy) = (region.src_x, region.src_y);
    let (mut dx, mut dy) = (region.dst_x, region.dst_y);
    let (mut w, mut h) = (region.width as i64, region.height as i64);

    // Negative source offsets shift the destination instead.
    if sx < 0 {
        dx -= sx;
        w += sx;
        sx = 0;
    }
    if sy < 0 {
        dy -= sy;
        h += sy;
        sy = 0;
    }
    if dx < 0 {
        sx -= dx;
        w += dx;
        dx = 0;
    }
    if dy < 0 {
        sy -= dy;
        h += dy;
        dy = 0;
    }
    w = w
        .min(source.width as i64 - sx)
        .min(dest.width as i64 - dx);
    h = h
        .min(source.height as i64 - sy)
        .min(dest.height as i64 - dy);

    (w > 0 && h > 0).then(|| (sx as u32, sy as u32, dx, dy, w as u32, h as u32))
}

fn average_block(buffer: &RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) -> Rgba<u8> {
    let mut sum = [0u64; 4];
    for y in y0..y1 {
        for x in x0..x1 {
            let p = buffer.get_pixel(x, y);
            for (acc, &c) in sum.iter_mut().zip(p.0.iter()) {
                *acc += c as u64;
            }
        }
    }
    let n = ((x1 - x0) as u64 * (y1 - y0) as u64).max(1);
    Rgba(sum.map(|s| ((s + n / 2) / n) as u8))
}

impl RasterBackend for RustBackend {
    type Buffer = RgbaImage;

    fn dimensions(&self, buffer: &RgbaImage) -> Dimensions {
        Dimensions::new(buffer.width(), buffer.height())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Decoded<RgbaImage>, BackendError> {
        let format = image::guess_format(bytes)
            .map_err(|_| BackendError::UnsupportedFormat("unrecognised image data".to_string()))?;
        let source_format = match format {
            ImageFormat::Png => SourceFormat::Png,
            ImageFormat::Jpeg => SourceFormat::Jpeg,
            other => return Err(BackendError::UnsupportedFormat(format!("{other:?}"))),
        };
        let buffer = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode: {e}")))?
            .to_rgba8();
        let size = self.dimensions(&buffer);
        trace!(%size, ?source_format, "decoded");
        Ok(Decoded {
            buffer,
            size,
            format: source_format,
        })
    }

    fn create_blank(&self, size: Dimensions) -> Result<RgbaImage, BackendError> {
        if size.is_empty() {
            return Err(BackendError::DegenerateGeometry {
                width: size.width as f64,
                height: size.height as f64,
            });
        }
        Ok(RgbaImage::from_pixel(
            size.width,
            size.height,
            Rgba([0, 0, 0, 255]),
        ))
    }

    fn scale(&self, source: &RgbaImage, size: Dimensions) -> Result<RgbaImage, BackendError> {
        ensure_nonempty(source, "source")?;
        if size.is_empty() {
            return Err(BackendError::DegenerateGeometry {
                width: size.width as f64,
                height: size.height as f64,
            });
        }
        trace!(from = %self.dimensions(source), to = %size, filter = ?self.filter, "scale");
        Ok(imageops::resize(
            source,
            size.width,
            size.height,
            filter_type(self.filter),
        ))
    }

    fn crop(&self, source: &RgbaImage, window: Placement) -> Result<RgbaImage, BackendError> {
        ensure_nonempty(source, "source")?;
        let inside = |offset: i64, len: u32, limit: u32| {
            offset >= 0 && len > 0 && offset + len as i64 <= limit as i64
        };
        if !inside(window.x, window.width, source.width())
            || !inside(window.y, window.height, source.height())
        {
            return Err(BackendError::InvalidBuffer(format!(
                "crop {}x{} at ({}, {}) outside {}",
                window.width,
                window.height,
                window.x,
                window.y,
                self.dimensions(source)
            )));
        }
        trace!(?window, "crop");
        Ok(imageops::crop_imm(
            source,
            window.x as u32,
            window.y as u32,
            window.width,
            window.height,
        )
        .to_image())
    }

    fn copy_region(
        &self,
        dest: &mut RgbaImage,
        source: &RgbaImage,
        region: CopyRegion,
    ) -> Result<(), BackendError> {
        ensure_nonempty(dest, "destination")?;
        ensure_nonempty(source, "source")?;
        let Some((sx, sy, dx, dy, w, h)) =
            clip_region(region, self.dimensions(source), self.dimensions(dest))
        else {
            trace!(?region, "copy region clipped away");
            return Ok(());
        };
        let patch = imageops::crop_imm(source, sx, sy, w, h).to_image();
        imageops::overlay(dest, &patch, dx, dy);
        Ok(())
    }

    fn gaussian_blur(&self, buffer: &mut RgbaImage) -> Result<(), BackendError> {
        ensure_nonempty(buffer, "blur")?;
        *buffer = imageops::blur(&*buffer, GAUSSIAN_SIGMA);
        Ok(())
    }

    fn pixelate(&self, buffer: &mut RgbaImage, block: BlockSize) -> Result<(), BackendError> {
        ensure_nonempty(buffer, "pixelate")?;
        if block.width == 0 || block.height == 0 {
            return Err(BackendError::NotApplicable(format!(
                "pixelate block {}x{} must be positive",
                block.width, block.height
            )));
        }
        let (w, h) = buffer.dimensions();
        for y0 in (0..h).step_by(block.height as usize) {
            let y1 = y0.saturating_add(block.height).min(h);
            for x0 in (0..w).step_by(block.width as usize) {
                let x1 = x0.saturating_add(block.width).min(w);
                let color = average_block(buffer, x0, y0, x1, y1);
                for y in y0..y1 {
                    for x in x0..x1 {
                        buffer.put_pixel(x, y, color);
                    }
                }
            }
        }
        Ok(())
    }

    fn fill_solid(&self, buffer: &mut RgbaImage, color: Rgb) -> Result<(), BackendError> {
        ensure_nonempty(buffer, "fill")?;
        let pixel = Rgba([color.r, color.g, color.b, 255]);
        for p in buffer.pixels_mut() {
            *p = pixel;
        }
        Ok(())
    }

    fn encode(&self, buffer: &RgbaImage, format: OutputFormat) -> Result<Vec<u8>, BackendError> {
        ensure_nonempty(buffer, "encode")?;
        let mut bytes = Vec::new();
        let mut cursor = Cursor::new(&mut bytes);
        let result = match format {
            OutputFormat::Png => buffer.write_to(&mut cursor, ImageFormat::Png),
            OutputFormat::Jpg => DynamicImage::ImageRgba8(buffer.clone())
                .into_rgb8()
                .write_to(&mut cursor, ImageFormat::Jpeg),
        };
        result.map_err(|e| {
            BackendError::ProcessingFailed(format!("{} encode failed: {e}", format.extension()))
        })?;
        Ok(bytes)
    }
}
