//! The composition pipeline.
//!
//! Turns one source image into a fixed-size card: the canvas is allocated,
//! painted or filled with the source itself, filtered, and the source is
//! fitted and centered on top.
//!
//! ```text
//! decode → container → background → filter → fit → combine → encode
//! ```
//!
//! Every stage reports failures as a [`ComposeError`] naming the stage. A
//! failure aborts that image only; [`compose_batch`] keeps going with the
//! rest. Filters that do not apply (zero-sized pixelation blocks, blur rounds
//! that are out of range) are logged and skipped.
//!
//! ## Parallel Processing
//!
//! Batches run on the global [rayon](https://docs.rs/rayon) pool. The binary
//! sizes the pool from `[processing] max_processes`.

use crate::config::{BackgroundMode, ComposeConfig};
use crate::imaging::{
    BackendError, Canvas, Dimensions, OutputFormat, Placement, RasterBackend, SourceImage, blur,
    fill, fit, pixelate, render,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Pipeline stage, used to report where an image failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Container,
    Background,
    Filter,
    Fit,
    Combine,
    Encode,
    Io,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Decode => "decode",
            Self::Container => "container",
            Self::Background => "background",
            Self::Filter => "filter",
            Self::Fit => "fit",
            Self::Combine => "combine",
            Self::Encode => "encode",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct ComposeError {
    pub stage: Stage,
    pub source: BackendError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, ComposeError>;
}

impl<T> AtStage<T> for Result<T, BackendError> {
    fn at(self, stage: Stage) -> Result<T, ComposeError> {
        self.map_err(|source| ComposeError { stage, source })
    }
}

impl<T> AtStage<T> for Result<T, std::io::Error> {
    fn at(self, stage: Stage) -> Result<T, ComposeError> {
        self.map_err(|e| ComposeError {
            stage,
            source: BackendError::Io(e),
        })
    }
}

/// Geometry of a finished composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Layout {
    pub source: Dimensions,
    pub canvas: Dimensions,
    /// Where the fitted foreground sits on the canvas.
    pub placement: Placement,
    /// Gaussian blur passes applied to the background.
    pub blur_passes: u32,
}

/// An encoded composition.
#[derive(Debug, Clone)]
pub struct Composed {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub layout: Layout,
}

/// Run every stage up to `encode` and hand back the finished canvas.
pub fn compose_canvas<B: RasterBackend>(
    backend: &B,
    bytes: &[u8],
    config: &ComposeConfig,
) -> Result<(Canvas<B>, Layout), ComposeError> {
    let source = SourceImage::decode(backend, bytes).at(Stage::Decode)?;

    let mut canvas =
        Canvas::add_container(backend, config.container.width, config.container.height)
            .at(Stage::Container)?;

    if let Some(hex) = config.container.color.as_deref() {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        canvas
            .set_background_color(backend, hex)
            .at(Stage::Background)?;
    }

    let mut blur_passes = 0;
    if config.background.mode == BackgroundMode::Image {
        fill(backend, &source, &mut canvas).at(Stage::Background)?;
        blur_passes = apply_filters(backend, canvas.buffer_mut(), config)?;
    }

    let foreground = fit(backend, &source, &canvas, config.foreground.margin()).at(Stage::Fit)?;
    let placement = canvas.combine(backend, &foreground).at(Stage::Combine)?;

    let layout = Layout {
        source: source.size(),
        canvas: canvas.size(),
        placement,
        blur_passes,
    };
    debug!(?layout, "composed");
    Ok((canvas, layout))
}

/// Blur then pixelate the background. Filters that do not apply are skipped.
fn apply_filters<B: RasterBackend>(
    backend: &B,
    buffer: &mut B::Buffer,
    config: &ComposeConfig,
) -> Result<u32, ComposeError> {
    let mut passes = 0;
    if config.background.blur_rounds != 0 {
        let rounds = config.background.blur_rounds;
        passes = skip_not_applicable(blur(backend, &mut *buffer, rounds), "blur")?.unwrap_or(0);
    }
    if let Some(block) = config.background.pixelate_block() {
        skip_not_applicable(pixelate(backend, buffer, block), "pixelate")?;
    }
    Ok(passes)
}

fn skip_not_applicable<T>(
    result: Result<T, BackendError>,
    filter: &str,
) -> Result<Option<T>, ComposeError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_recoverable() => {
            warn!(filter, error = %e, "filter skipped");
            Ok(None)
        }
        Err(source) => Err(ComposeError {
            stage: Stage::Filter,
            source,
        }),
    }
}

/// Compose and encode one image from memory.
pub fn compose<B: RasterBackend>(
    backend: &B,
    bytes: &[u8],
    config: &ComposeConfig,
) -> Result<Composed, ComposeError> {
    let (canvas, layout) = compose_canvas(backend, bytes, config)?;
    let format = config.output.format;
    let bytes = backend.encode(canvas.buffer(), format).at(Stage::Encode)?;
    Ok(Composed {
        bytes,
        format,
        layout,
    })
}

/// Compose one image and stream it to `out`, with the `Content-Type` header
/// when `[output] header` is set.
pub fn compose_to_writer<B: RasterBackend>(
    backend: &B,
    bytes: &[u8],
    config: &ComposeConfig,
    out: &mut impl Write,
) -> Result<Layout, ComposeError> {
    let (canvas, layout) = compose_canvas(backend, bytes, config)?;
    render(
        backend,
        canvas.buffer(),
        config.output.format,
        config.output.header,
        out,
    )
    .at(Stage::Encode)?;
    Ok(layout)
}

/// Read `input`, compose it and write the encoded result to `output`.
pub fn compose_file<B: RasterBackend>(
    backend: &B,
    input: &Path,
    output: &Path,
    config: &ComposeConfig,
) -> Result<Layout, ComposeError> {
    let bytes = fs::read(input).at(Stage::Io)?;
    let composed = compose(backend, &bytes, config)?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).at(Stage::Io)?;
    }
    fs::write(output, &composed.bytes).at(Stage::Io)?;
    debug!(input = %input.display(), output = %output.display(), "written");
    Ok(composed.layout)
}

/// One input/output pair for a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// What happened to one [`Job`].
#[derive(Debug)]
pub struct BatchOutcome {
    pub job: Job,
    pub result: Result<Layout, ComposeError>,
}

/// Compose every job in parallel. Outcomes come back in job order.
pub fn compose_batch<B: RasterBackend>(
    backend: &B,
    jobs: &[Job],
    config: &ComposeConfig,
) -> Vec<BatchOutcome> {
    jobs.par_iter()
        .map(|job| {
            let result = compose_file(backend, &job.input, &job.output, config);
            if let Err(e) = &result {
                warn!(input = %job.input.display(), error = %e, "compose failed");
            }
            BatchOutcome {
                job: job.clone(),
                result,
            }
        })
        .collect()
}

const SOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

fn is_source_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Expand inputs into jobs writing `<stem>.<ext>` under `out_dir`.
///
/// Directories are walked recursively in file-name order and contribute their
/// PNG and JPEG files; each file's sub-directory below the walked root is
/// mirrored under `out_dir`. Plain file arguments are taken as given, whatever
/// their extension, so bad inputs surface as decode failures instead of
/// vanishing.
///
/// Output paths are unique within the batch. When two sources would land on
/// the same file (`a.png` next to `a.jpg`, or the same stem passed twice), the
/// later one gets a numeric suffix: `a.png`, `a-2.png`, `a-3.png`. Comparison
/// ignores case so the result also holds on case-insensitive filesystems.
pub fn collect_jobs(
    inputs: &[PathBuf],
    out_dir: &Path,
    format: OutputFormat,
) -> Result<Vec<Job>, std::io::Error> {
    // (source, directory relative to out_dir)
    let mut sources = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && is_source_image(entry.path()) {
                    let relative = entry
                        .path()
                        .parent()
                        .and_then(|dir| dir.strip_prefix(input).ok())
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    sources.push((entry.into_path(), relative));
                }
            }
        } else {
            sources.push((input.clone(), PathBuf::new()));
        }
    }

    let mut taken = HashSet::new();
    Ok(sources
        .into_iter()
        .map(|(input, relative)| {
            let stem = input.file_stem().unwrap_or(input.as_os_str());
            let dir = out_dir.join(relative);
            let mut output = dir.join(output_name(stem, None, format));
            let mut n = 2;
            while !taken.insert(output.to_string_lossy().to_lowercase()) {
                output = dir.join(output_name(stem, Some(n), format));
                n += 1;
            }
            if n > 2 {
                debug!(
                    input = %input.display(),
                    output = %output.display(),
                    "renamed colliding output"
                );
            }
            Job { input, output }
        })
        .collect())
}

fn output_name(stem: &OsStr, suffix: Option<u32>, format: OutputFormat) -> OsString {
    let mut name = stem.to_os_string();
    if let Some(n) = suffix {
        name.push(format!("-{n}"));
    }
    name.push(".");
    name.push(format.extension());
    name
}
