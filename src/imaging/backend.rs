//! Raster backend trait and shared types.
//!
//! The [`RasterBackend`] trait is the boundary to the pixel library. It owns
//! the buffer type and the primitives the fitting engine consumes: decode,
//! create-blank, scale, crop, copy-region, a single gaussian blur pass, pixelate,
//! fill-solid and encode. Geometry never lives here; backends do exactly what
//! they are told.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` in this module.

use super::params::{BlockSize, CopyRegion, OutputFormat, Placement, Rgb, SourceFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("degenerate source dimensions {width}x{height}")]
    DegenerateSource { width: u32, height: u32 },
    #[error("degenerate geometry {width}x{height}")]
    DegenerateGeometry { width: f64, height: f64 },
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),
    #[error("not applicable: {0}")]
    NotApplicable(String),
    #[error("invalid color {0:?}: expected 6 hex digits")]
    InvalidColor(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl BackendError {
    /// Whether the pipeline may report this error and carry on with its input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotApplicable(_))
    }
}

/// Pixel dimensions of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Result of a decode: the buffer plus what the decoder learned about it.
#[derive(Debug)]
pub struct Decoded<B> {
    pub buffer: B,
    pub size: Dimensions,
    pub format: SourceFormat,
}

/// Trait for raster backends.
///
/// Every backend implements the full primitive set so the operations layer is
/// backend-agnostic. Primitives that take `&mut Self::Buffer` must leave the
/// buffer untouched when they return an error.
pub trait RasterBackend: Sync {
    type Buffer: Send;

    /// Size of a buffer.
    fn dimensions(&self, buffer: &Self::Buffer) -> Dimensions;

    /// Decode PNG or JPEG bytes. Anything else is `UnsupportedFormat`.
    fn decode(&self, bytes: &[u8]) -> Result<Decoded<Self::Buffer>, BackendError>;

    /// Allocate an opaque black buffer.
    fn create_blank(&self, size: Dimensions) -> Result<Self::Buffer, BackendError>;

    /// Scale to exactly `size`, returning a new buffer.
    fn scale(&self, source: &Self::Buffer, size: Dimensions) -> Result<Self::Buffer, BackendError>;

    /// Copy `window` out of `source` into a new buffer of the window's size.
    ///
    /// The window must lie inside the source.
    fn crop(&self, source: &Self::Buffer, window: Placement) -> Result<Self::Buffer, BackendError>;

    /// Copy a region of `source` into `dest`, alpha-blending, clipped to both.
    fn copy_region(
        &self,
        dest: &mut Self::Buffer,
        source: &Self::Buffer,
        region: CopyRegion,
    ) -> Result<(), BackendError>;

    /// One gaussian blur pass, in place.
    fn gaussian_blur(&self, buffer: &mut Self::Buffer) -> Result<(), BackendError>;

    /// One pixelation pass with the given block size, in place.
    fn pixelate(&self, buffer: &mut Self::Buffer, block: BlockSize) -> Result<(), BackendError>;

    /// Paint the whole buffer with a solid color.
    fn fill_solid(&self, buffer: &mut Self::Buffer, color: Rgb) -> Result<(), BackendError>;

    /// Encode to bytes.
    fn encode(&self, buffer: &Self::Buffer, format: OutputFormat) -> Result<Vec<u8>, BackendError>;
}
