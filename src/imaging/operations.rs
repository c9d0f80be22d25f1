//! High-level image operations.
//!
//! These functions combine the pure [`calculations`](super::calculations) with
//! backend execution. Geometry is decided here; pixels are pushed by the
//! backend.
//!
//! Ownership follows the pipeline: a [`SourceImage`] is read-only once decoded,
//! every resize returns a fresh buffer, and the only operations that write into
//! an existing buffer are the ones that say so (`fill`, `combine`, the filters
//! and the canvas color). Those check everything they can before the first
//! write, so a failed call leaves its destination as it was.

use super::backend::{BackendError, Dimensions, RasterBackend};
use super::calculations::{
    MarginFraction, centered_placement, fill_dimensions, fill_window, fit_extent,
    parse_hex_color, resize_extent,
};
use super::params::{BlockSize, CopyRegion, OutputFormat, Placement, ResizeMode, Rgb, SourceFormat};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// A decoded source image with its intrinsic size.
///
/// The size is captured at decode time and never changes; resizes produce new
/// buffers and leave this one alone.
pub struct SourceImage<B: RasterBackend> {
    buffer: B::Buffer,
    size: Dimensions,
    format: SourceFormat,
}

impl<B: RasterBackend> SourceImage<B> {
    /// Decode PNG or JPEG bytes.
    pub fn decode(backend: &B, bytes: &[u8]) -> Result<Self> {
        let decoded = backend.decode(bytes)?;
        debug!(size = %decoded.size, format = ?decoded.format, "source decoded");
        Ok(Self {
            buffer: decoded.buffer,
            size: decoded.size,
            format: decoded.format,
        })
    }

    /// Read and decode a file.
    pub fn open(backend: &B, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::decode(backend, &bytes)
    }

    pub fn size(&self) -> Dimensions {
        self.size
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }
}

/// The fixed-size destination an image is fitted into or made to fill.
pub struct Canvas<B: RasterBackend> {
    buffer: B::Buffer,
    size: Dimensions,
    background: Option<Rgb>,
}

impl<B: RasterBackend> Canvas<B> {
    /// Allocate a container of the given size.
    pub fn add_container(backend: &B, width: u32, height: u32) -> Result<Self> {
        let size = Dimensions::new(width, height);
        if size.is_empty() {
            return Err(BackendError::DegenerateGeometry {
                width: width as f64,
                height: height as f64,
            });
        }
        let buffer = backend.create_blank(size)?;
        Ok(Self {
            buffer,
            size,
            background: None,
        })
    }

    pub fn size(&self) -> Dimensions {
        self.size
    }

    /// The color set by the last successful `set_background_color`.
    pub fn background(&self) -> Option<Rgb> {
        self.background
    }

    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }

    /// Mutable access for in-place filters. Filters must keep the size.
    pub fn buffer_mut(&mut self) -> &mut B::Buffer {
        &mut self.buffer
    }

    /// Paint the canvas with a `RRGGBB` color.
    ///
    /// The string must be exactly six hex digits. On any failure the canvas is
    /// left untouched.
    pub fn set_background_color(&mut self, backend: &B, hex: &str) -> Result<Rgb> {
        let color = parse_hex_color(hex)?;
        self.fill_color(backend, color)?;
        Ok(color)
    }

    /// Paint the canvas with an already parsed color.
    pub fn fill_color(&mut self, backend: &B, color: Rgb) -> Result<()> {
        ensure_buffer(backend, &self.buffer, "canvas")?;
        backend.fill_solid(&mut self.buffer, color)?;
        self.background = Some(color);
        debug!(%color, "canvas background");
        Ok(())
    }

    /// Composite `foreground` onto the center of the canvas.
    pub fn combine(&mut self, backend: &B, foreground: &B::Buffer) -> Result<Placement> {
        combine(backend, &mut self.buffer, foreground)
    }
}

fn ensure_buffer<B: RasterBackend>(backend: &B, buffer: &B::Buffer, what: &str) -> Result<Dimensions> {
    let size = backend.dimensions(buffer);
    if size.is_empty() {
        return Err(BackendError::InvalidBuffer(format!("{what} buffer is {size}")));
    }
    Ok(size)
}

/// Resize a source image.
///
/// - [`ResizeMode::Exact`] scales to `(new_width, new_height)`, distorting if
///   the ratios disagree.
/// - [`ResizeMode::LockHeight`] scales so the height is `new_height`.
/// - [`ResizeMode::LockWidth`] scales so the width is `new_width`.
///
/// Sizes are rounded to whole pixels here. The source is never modified.
pub fn resize<B: RasterBackend>(
    backend: &B,
    source: &SourceImage<B>,
    new_width: f64,
    new_height: f64,
    mode: ResizeMode,
) -> Result<B::Buffer> {
    resize_buffer(backend, &source.buffer, source.size, new_width, new_height, mode)
}

/// [`resize`] for any buffer whose intrinsic size is known.
pub fn resize_buffer<B: RasterBackend>(
    backend: &B,
    buffer: &B::Buffer,
    source_size: Dimensions,
    new_width: f64,
    new_height: f64,
    mode: ResizeMode,
) -> Result<B::Buffer> {
    let target = resize_extent(source_size, new_width, new_height, mode)?.to_pixels()?;
    debug!(from = %source_size, to = %target, ?mode, "resize");
    backend.scale(buffer, target)
}

/// Pixel size `source` gets when fitted into `canvas` with `margin`.
///
/// A side that would round to nothing is kept one pixel wide, so very long or
/// very thin sources still show up as a line.
pub fn fit_dimensions<B: RasterBackend>(
    source: &SourceImage<B>,
    canvas: &Canvas<B>,
    margin: MarginFraction,
) -> Result<Dimensions> {
    fit_extent(source.size, canvas.size, margin)?.to_visible_pixels()
}

/// Resize `source` so it fits inside `canvas`, keeping its aspect ratio.
///
/// The result is never larger than the source or the canvas. Placement is
/// left to [`combine`].
pub fn fit<B: RasterBackend>(
    backend: &B,
    source: &SourceImage<B>,
    canvas: &Canvas<B>,
    margin: MarginFraction,
) -> Result<B::Buffer> {
    let extent = fit_extent(source.size, canvas.size, margin)?;
    let target = extent.to_visible_pixels()?;
    debug!(
        source = %source.size,
        container = %canvas.size,
        margin = margin.value(),
        width = extent.width,
        height = extent.height,
        fitted = %target,
        "fit"
    );
    backend.scale(&source.buffer, target)
}

/// Cover `canvas` with `source`, cropping the overflow around the center.
///
/// The source is scaled up until it covers the canvas on both axes (never
/// down) and the canvas-sized window at its center ends up on the canvas.
/// Only the visible part of the source is resampled: the matching window is
/// cropped out first and scaled straight to the canvas size. A source that
/// already covers the canvas is copied without resampling.
///
/// Returns where the full scaled image would sit relative to the canvas; the
/// offsets are zero or negative.
pub fn fill<B: RasterBackend>(
    backend: &B,
    source: &SourceImage<B>,
    canvas: &mut Canvas<B>,
) -> Result<Placement> {
    ensure_buffer(backend, &canvas.buffer, "canvas")?;
    let target = fill_dimensions(source.size, canvas.size)?;
    let window = fill_window(source.size, canvas.size)?;
    let placement = centered_placement(canvas.size, target);
    debug!(
        source = %source.size,
        scaled = %target,
        x = placement.x,
        y = placement.y,
        window = ?window,
        "fill"
    );

    let size = canvas.size;
    let full = |src_x, src_y| CopyRegion {
        dst_x: 0,
        dst_y: 0,
        src_x,
        src_y,
        width: size.width,
        height: size.height,
    };
    if Dimensions::new(window.width, window.height) == size {
        let region = full(window.x, window.y);
        backend.copy_region(&mut canvas.buffer, &source.buffer, region)?;
    } else {
        let cropped = backend.crop(&source.buffer, window)?;
        let scaled = backend.scale(&cropped, size)?;
        backend.copy_region(&mut canvas.buffer, &scaled, full(0, 0))?;
    }
    Ok(placement)
}

/// Composite `foreground` onto the center of `background`.
///
/// No scaling happens here; the foreground is copied at its own size and
/// whatever falls outside the background is clipped. The background keeps its
/// dimensions.
pub fn combine<B: RasterBackend>(
    backend: &B,
    background: &mut B::Buffer,
    foreground: &B::Buffer,
) -> Result<Placement> {
    let bg = ensure_buffer(backend, &*background, "background")?;
    let fg = ensure_buffer(backend, foreground, "foreground")?;
    let placement = centered_placement(bg, fg);
    debug!(background = %bg, foreground = %fg, x = placement.x, y = placement.y, "combine");

    backend.copy_region(
        background,
        foreground,
        CopyRegion {
            dst_x: placement.x,
            dst_y: placement.y,
            src_x: 0,
            src_y: 0,
            width: fg.width,
            height: fg.height,
        },
    )?;
    Ok(placement)
}

/// Apply `rounds` sequential gaussian blur passes.
///
/// Zero or negative rounds, or an empty buffer, is [`BackendError::NotApplicable`]
/// and the buffer is not touched. Returns the number of passes applied.
pub fn blur<B: RasterBackend>(backend: &B, buffer: &mut B::Buffer, rounds: i64) -> Result<u32> {
    if rounds <= 0 {
        return Err(BackendError::NotApplicable(format!(
            "blur rounds must be positive, got {rounds}"
        )));
    }
    let rounds = u32::try_from(rounds).map_err(|_| {
        BackendError::NotApplicable(format!("blur rounds {rounds} out of range"))
    })?;
    ensure_buffer(backend, &*buffer, "blur")
        .map_err(|e| BackendError::NotApplicable(e.to_string()))?;

    for _ in 0..rounds {
        backend.gaussian_blur(buffer)?;
    }
    debug!(rounds, "blur");
    Ok(rounds)
}

/// Single pixelation pass. Validation is left to the backend.
pub fn pixelate<B: RasterBackend>(backend: &B, buffer: &mut B::Buffer, block: BlockSize) -> Result<()> {
    backend.pixelate(buffer, block)?;
    debug!(width = block.width, height = block.height, "pixelate");
    Ok(())
}

/// Encode `buffer` and write it to `out`.
///
/// With `header` set, a `Content-Type` line for the format and a blank line go
/// first. Returns the number of image bytes written.
pub fn render<B: RasterBackend>(
    backend: &B,
    buffer: &B::Buffer,
    format: OutputFormat,
    header: bool,
    out: &mut impl Write,
) -> Result<usize> {
    let bytes = backend.encode(buffer, format)?;
    if header {
        write!(out, "Content-Type: {}\r\n\r\n", format.mime_type())?;
    }
    out.write_all(&bytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, MockBuffer, RecordedOp};

    fn source(backend: &MockBackend, width: u32, height: u32) -> SourceImage<MockBackend> {
        backend
            .decode_results
            .lock()
            .unwrap()
            .push(Dimensions::new(width, height));
        SourceImage::decode(backend, b"mock").unwrap()
    }

    // =========================================================================
    // SourceImage / Canvas
    // =========================================================================

    #[test]
    fn source_keeps_intrinsic_size() {
        let backend = MockBackend::new();
        let src = source(&backend, 800, 600);
        assert_eq!(src.size(), Dimensions::new(800, 600));

        resize(&backend, &src, 10.0, 10.0, ResizeMode::Exact).unwrap();
        assert_eq!(src.size(), Dimensions::new(800, 600));
        assert_eq!(src.buffer().size, Dimensions::new(800, 600));
    }

    #[test]
    fn add_container_rejects_zero_side() {
        let backend = MockBackend::new();
        assert!(matches!(
            Canvas::add_container(&backend, 0, 600),
            Err(BackendError::DegenerateGeometry { .. })
        ));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn set_background_color_fills_canvas() {
        let backend = MockBackend::new();
        let mut canvas = Canvas::add_container(&backend, 1200, 600).unwrap();

        let color = canvas.set_background_color(&backend, "1A2B3C").unwrap();
        assert_eq!(color, Rgb::new(26, 43, 60));
        assert_eq!(canvas.background(), Some(color));
        assert_eq!(canvas.buffer().fill, Some(Rgb::new(26, 43, 60)));
    }

    #[test]
    fn set_background_color_short_string_leaves_canvas() {
        let backend = MockBackend::new();
        let mut canvas = Canvas::add_container(&backend, 100, 100).unwrap();
        let before = canvas.buffer().clone();

        let err = canvas.set_background_color(&backend, "1A2B3").unwrap_err();
        assert!(matches!(err, BackendError::InvalidColor(_)));
        assert_eq!(canvas.buffer(), &before);
        assert_eq!(canvas.background(), None);
        assert_eq!(backend.count(|op| matches!(op, RecordedOp::FillSolid(_))), 0);
    }

    // =========================================================================
    // Resizer
    // =========================================================================

    #[test]
    fn resize_exact_yields_requested_size() {
        let backend = MockBackend::new();
        let src = source(&backend, 800, 600);
        let out = resize(&backend, &src, 123.0, 456.0, ResizeMode::Exact).unwrap();
        assert_eq!(out.size, Dimensions::new(123, 456));
    }

    #[test]
    fn resize_lock_height_keeps_ratio() {
        let backend = MockBackend::new();
        let src = source(&backend, 800, 600);
        let out = resize(&backend, &src, 1.0, 300.0, ResizeMode::LockHeight).unwrap();
        assert_eq!(out.size, Dimensions::new(400, 300));
    }

    #[test]
    fn resize_lock_width_keeps_ratio() {
        let backend = MockBackend::new();
        let src = source(&backend, 1000, 333);
        let out = resize(&backend, &src, 500.0, 1.0, ResizeMode::LockWidth).unwrap();
        // 333 * 0.5 = 166.5 → 167
        assert_eq!(out.size, Dimensions::new(500, 167));
    }

    #[test]
    fn resize_zero_source_is_degenerate_source() {
        let backend = MockBackend::new();
        let buf = MockBuffer::new(0, 10);
        let err = resize_buffer(
            &backend,
            &buf,
            Dimensions::new(0, 10),
            10.0,
            10.0,
            ResizeMode::LockWidth,
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::DegenerateSource { .. }));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn resize_to_nothing_is_degenerate_geometry() {
        let backend = MockBackend::new();
        let src = source(&backend, 800, 600);
        assert!(matches!(
            resize(&backend, &src, 0.0, 10.0, ResizeMode::Exact),
            Err(BackendError::DegenerateGeometry { .. })
        ));
    }

    // =========================================================================
    // FitEngine
    // =========================================================================

    #[test]
    fn fit_wide_scenario_stays_within_container() {
        let backend = MockBackend::new();
        let src = source(&backend, 800, 600);
        let canvas = Canvas::add_container(&backend, 1200, 600).unwrap();

        let out = fit(&backend, &src, &canvas, MarginFraction::FULL).unwrap();
        assert!(out.size.height <= 600);
        assert!(out.size.width <= 1200);
        let ratio = out.size.width as f64 / out.size.height as f64;
        assert!((ratio - 800.0 / 600.0).abs() < 0.01);
    }

    #[test]
    fn fit_scales_exactly_once() {
        let backend = MockBackend::new();
        let src = source(&backend, 3000, 2000);
        let canvas = Canvas::add_container(&backend, 1200, 600).unwrap();

        let out = fit(&backend, &src, &canvas, MarginFraction::normalize(90.0)).unwrap();
        // th = 600, ratio 0.3; tw = min(2700, 10000, 4000) = 2700 → 810 x 540
        assert_eq!(out.size, Dimensions::new(810, 540));
        assert_eq!(
            backend.count(|op| matches!(op, RecordedOp::Scale { .. })),
            1
        );
        assert_eq!(
            fit_dimensions(&src, &canvas, MarginFraction::normalize(90.0)).unwrap(),
            out.size
        );
    }

    // =========================================================================
    // FillEngine
    // =========================================================================

    #[test]
    fn fit_keeps_slivers_one_pixel_wide() {
        let backend = MockBackend::new();
        let src = source(&backend, 1, 2000);
        let canvas = Canvas::add_container(&backend, 1200, 600).unwrap();

        // 0.3 x 600 before rounding
        let out = fit(&backend, &src, &canvas, MarginFraction::FULL).unwrap();
        assert_eq!(out.size, Dimensions::new(1, 600));
        assert_eq!(
            fit_dimensions(&src, &canvas, MarginFraction::FULL).unwrap(),
            out.size
        );
    }

    #[test]
    fn fill_scales_up_and_crops_center() {
        let backend = MockBackend::new();
        let src = source(&backend, 400, 300);
        let mut canvas = Canvas::add_container(&backend, 1200, 600).unwrap();

        let placement = fill(&backend, &src, &mut canvas).unwrap();
        assert_eq!(
            placement,
            Placement {
                x: 0,
                y: -150,
                width: 1200,
                height: 900
            }
        );
        assert_eq!(canvas.size(), Dimensions::new(1200, 600));
        // scale 3: the visible 1200x600 is the source's 400x200 middle band
        let ops = backend.get_operations();
        assert_eq!(ops[1], RecordedOp::CreateBlank(Dimensions::new(1200, 600)));
        assert_eq!(
            ops[2..],
            [
                RecordedOp::Crop {
                    from: Dimensions::new(400, 300),
                    window: Placement {
                        x: 0,
                        y: 50,
                        width: 400,
                        height: 200
                    }
                },
                RecordedOp::Scale {
                    from: Dimensions::new(400, 200),
                    to: Dimensions::new(1200, 600)
                },
                RecordedOp::CopyRegion(CopyRegion {
                    dst_x: 0,
                    dst_y: 0,
                    src_x: 0,
                    src_y: 0,
                    width: 1200,
                    height: 600,
                }),
            ]
        );
    }

    #[test]
    fn fill_tall_strip_resamples_only_the_window() {
        let backend = MockBackend::new();
        let src = source(&backend, 100, 3000);
        let mut canvas = Canvas::add_container(&backend, 1200, 600).unwrap();

        let placement = fill(&backend, &src, &mut canvas).unwrap();
        assert_eq!((placement.width, placement.height), (1200, 36000));
        let scales: Vec<_> = backend
            .get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Scale { .. }))
            .collect();
        assert_eq!(
            scales,
            vec![RecordedOp::Scale {
                from: Dimensions::new(100, 50),
                to: Dimensions::new(1200, 600)
            }]
        );
    }

    #[test]
    fn fill_large_source_is_copied_without_scaling() {
        let backend = MockBackend::new();
        let src = source(&backend, 2000, 1000);
        let mut canvas = Canvas::add_container(&backend, 1200, 600).unwrap();

        fill(&backend, &src, &mut canvas).unwrap();
        assert_eq!(
            backend.count(|op| matches!(op, RecordedOp::Scale { .. } | RecordedOp::Crop { .. })),
            0
        );
        assert_eq!(
            canvas.buffer().pasted,
            vec![CopyRegion {
                dst_x: 0,
                dst_y: 0,
                src_x: 400,
                src_y: 200,
                width: 1200,
                height: 600,
            }]
        );
    }

    #[test]
    fn fill_degenerate_source_leaves_canvas() {
        let backend = MockBackend::new();
        let src = source(&backend, 0, 300);
        let mut canvas = Canvas::add_container(&backend, 1200, 600).unwrap();
        assert!(fill(&backend, &src, &mut canvas).is_err());
        assert!(canvas.buffer().pasted.is_empty());
    }

    // =========================================================================
    // Compositor
    // =========================================================================

    #[test]
    fn combine_centers_foreground() {
        let backend = MockBackend::new();
        let mut bg = MockBuffer::new(1200, 600);
        let fg = MockBuffer::new(800, 600);

        let placement = combine(&backend, &mut bg, &fg).unwrap();
        assert_eq!((placement.x, placement.y), (200, 0));
        assert_eq!(bg.size, Dimensions::new(1200, 600));
        assert_eq!(
            bg.pasted[0],
            CopyRegion {
                dst_x: 200,
                dst_y: 0,
                src_x: 0,
                src_y: 0,
                width: 800,
                height: 600,
            }
        );
    }

    #[test]
    fn combine_oversized_foreground_gets_negative_offset() {
        let backend = MockBackend::new();
        let mut canvas = Canvas::add_container(&backend, 100, 100).unwrap();
        let fg = MockBuffer::new(141, 60);
        let placement = canvas.combine(&backend, &fg).unwrap();
        assert_eq!((placement.x, placement.y), (-21, 20));
        assert_eq!(canvas.size(), Dimensions::new(100, 100));
    }

    #[test]
    fn combine_empty_foreground_writes_nothing() {
        let backend = MockBackend::new();
        let mut bg = MockBuffer::new(10, 10);
        let fg = MockBuffer::new(0, 0);
        assert!(matches!(
            combine(&backend, &mut bg, &fg),
            Err(BackendError::InvalidBuffer(_))
        ));
        assert!(bg.pasted.is_empty());
    }

    // =========================================================================
    // FilterStage
    // =========================================================================

    #[test]
    fn blur_applies_exact_pass_count() {
        let backend = MockBackend::new();
        let mut buf = MockBuffer::new(10, 10);
        assert_eq!(blur(&backend, &mut buf, 3).unwrap(), 3);
        assert_eq!(buf.blur_passes, 3);
        assert_eq!(
            backend.count(|op| matches!(op, RecordedOp::GaussianBlur)),
            3
        );
    }

    #[test]
    fn blur_non_positive_rounds_is_not_applicable() {
        let backend = MockBackend::new();
        let mut buf = MockBuffer::new(10, 10);
        for rounds in [0, -1] {
            let err = blur(&backend, &mut buf, rounds).unwrap_err();
            assert!(err.is_recoverable());
        }
        assert_eq!(buf, MockBuffer::new(10, 10));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn blur_empty_buffer_is_not_applicable() {
        let backend = MockBackend::new();
        let mut buf = MockBuffer::new(0, 10);
        assert!(matches!(
            blur(&backend, &mut buf, 8),
            Err(BackendError::NotApplicable(_))
        ));
    }

    #[test]
    fn pixelate_passes_block_to_backend() {
        let backend = MockBackend::new();
        let mut buf = MockBuffer::new(10, 10);
        let block = BlockSize {
            width: 4,
            height: 2,
        };
        pixelate(&backend, &mut buf, block).unwrap();
        assert_eq!(buf.pixelated, Some(block));
    }

    // =========================================================================
    // render
    // =========================================================================

    #[test]
    fn render_with_header_prefixes_content_type() {
        let backend = MockBackend::new();
        let buf = MockBuffer::new(4, 2);
        let mut out = Vec::new();
        let n = render(&backend, &buf, OutputFormat::Jpg, true, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Content-Type: image/jpeg\r\n\r\njpg:4x2");
        assert_eq!(n, "jpg:4x2".len());
    }

    #[test]
    fn render_without_header_writes_bytes_only() {
        let backend = MockBackend::new();
        let buf = MockBuffer::new(4, 2);
        let mut out = Vec::new();
        render(&backend, &buf, OutputFormat::Png, false, &mut out).unwrap();
        assert_eq!(out, b"png:4x2");
    }
}
