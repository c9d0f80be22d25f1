//! CLI output formatting.
//!
//! Results lead with the source file name; geometry is shown as indented
//! context so a batch run reads as an inventory of what was produced.
//!
//! # Output Format
//!
//! ## Compose
//!
//! ```text
//! photo.jpg → cards/photo.png (1200x600)
//!     Source: 3000x2000
//!     Foreground: 810x540 at (195, 30)
//!     Blur: 8 passes
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 photo.jpg → out/photo.png (1200x600)
//! 002 broken.gif FAILED at decode: unsupported format: Gif
//!
//! Composed 1 image, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure.

use crate::compose::{BatchOutcome, Layout};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// compose
// ============================================================================

/// Format a single composition as display lines.
///
/// `output` is `None` when the image went to stdout.
pub fn format_compose_result(input: &Path, output: Option<&Path>, layout: &Layout) -> Vec<String> {
    let target = output
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "stdout".to_string());
    let placement = &layout.placement;

    let mut lines = vec![format!(
        "{} → {} ({})",
        file_label(input),
        target,
        layout.canvas
    )];
    lines.push(format!("    Source: {}", layout.source));
    lines.push(format!(
        "    Foreground: {}x{} at ({}, {})",
        placement.width, placement.height, placement.x, placement.y
    ));
    if layout.blur_passes > 0 {
        lines.push(format!(
            "    Blur: {}",
            plural(layout.blur_passes as usize, "pass", "passes")
        ));
    }
    lines
}

/// Print a single composition to stdout.
pub fn print_compose_result(input: &Path, output: Option<&Path>, layout: &Layout) {
    for line in format_compose_result(input, output, layout) {
        println!("{}", line);
    }
}

/// Layout as pretty JSON, for scripting.
pub fn format_layout_json(layout: &Layout) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(layout)
}

// ============================================================================
// batch
// ============================================================================

/// Format batch outcomes: one line per job, a blank line, then a summary.
pub fn format_batch_outcomes(outcomes: &[BatchOutcome]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut failed = 0;

    for (i, outcome) in outcomes.iter().enumerate() {
        let label = file_label(&outcome.job.input);
        match &outcome.result {
            Ok(layout) => lines.push(format!(
                "{} {} → {} ({})",
                format_index(i + 1),
                label,
                outcome.job.output.display(),
                layout.canvas
            )),
            Err(e) => {
                failed += 1;
                lines.push(format!(
                    "{} {} FAILED at {}: {}",
                    format_index(i + 1),
                    label,
                    e.stage,
                    e.source
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Composed {}, {} failed",
        plural(outcomes.len() - failed, "image", "images"),
        failed
    ));
    lines
}

/// Print batch outcomes to stdout.
pub fn print_batch_outcomes(outcomes: &[BatchOutcome]) {
    for line in format_batch_outcomes(outcomes) {
        println!("{}", line);
    }
}
