//! Text-mode point picking and dataset discovery.
//!
//! This is intentionally kept separate from clap parsing:
//! - clap handles structured flags/subcommands
//! - the picker provides the "run `relax t1` and choose a voxel" UX without a TUI
//!
//! Dataset discovery searches for `*.npy` files under the current working directory.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use ndarray::ArrayView2;

use crate::domain::{Relaxation, Voxel};
use crate::error::AppError;

/// Default directory recursion depth for finding `.npy` files.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Shading ramp for the slice preview, dark to bright.
const SHADES: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Prompt for a `ROW,COL` coordinate inside a `rows x cols` image.
///
/// Behavior:
/// - invalid or out-of-bounds input re-prompts
/// - `q` cancels
/// - end of input is an error
pub fn prompt_for_voxel(
    input: &mut impl BufRead,
    output: &mut impl Write,
    rows: usize,
    cols: usize,
) -> Result<Voxel, AppError> {
    let write_err = |e: std::io::Error| AppError::new(2, format!("Failed to write prompt: {e}"));
    loop {
        write!(
            output,
            "Select a voxel as ROW,COL (0-{}, 0-{}) or q to quit: ",
            rows.saturating_sub(1),
            cols.saturating_sub(1)
        )
        .map_err(write_err)?;
        output.flush().map_err(write_err)?;

        let mut line = String::new();
        let bytes = input
            .read_line(&mut line)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;
        if bytes == 0 {
            return Err(AppError::new(
                2,
                "No voxel selected. Provide one with `--voxel ROW,COL`.",
            ));
        }

        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Point selection canceled."));
        }

        match line.parse::<Voxel>() {
            Ok(v) if v.row < rows && v.col < cols => return Ok(v),
            Ok(v) => writeln!(output, "Voxel {v} is outside the {rows}x{cols} image.").map_err(write_err)?,
            Err(e) => writeln!(output, "{e}").map_err(write_err)?,
        }
    }
}

/// Downsampled shaded preview of an image, at most `max_width` characters wide.
///
/// Each line starts with the first image row it covers so coordinates can be read off.
pub fn render_slice_preview(slice: ArrayView2<'_, f64>, max_width: usize) -> String {
    let (rows, cols) = slice.dim();
    if rows == 0 || cols == 0 {
        return String::new();
    }
    let step = cols.div_ceil(max_width.max(1)).max(1);
    // Terminal cells are about twice as tall as wide.
    let row_step = step * 2;

    let (lo, hi) = slice
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = if hi > lo { hi - lo } else { 1.0 };

    let mut out = format!("     cols 0..{} (one char = {step} col(s))\n", cols - 1);
    for r in (0..rows).step_by(row_step) {
        out.push_str(&format!("{r:>4} "));
        for c in (0..cols).step_by(step) {
            let v = slice[[r, c]];
            let ch = if v.is_finite() {
                let u = ((v - lo) / span).clamp(0.0, 1.0);
                SHADES[(u * (SHADES.len() - 1) as f64).round() as usize]
            } else {
                '?'
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

/// Resolve the dataset path for a run.
///
/// An explicit path must exist. Without one, the relaxation's default file name
/// is used; if that is missing too, the error lists the `.npy` files found nearby.
pub fn resolve_data_path(explicit: Option<&Path>, relaxation: Relaxation) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        return validate_npy_path(path);
    }
    let default = PathBuf::from(relaxation.default_data_file());
    if default.is_file() {
        return Ok(default);
    }

    let found = discover_npy_files();
    let mut msg = format!(
        "Dataset '{}' not found. Pass one with `--data <file.npy>`.",
        default.display()
    );
    if !found.is_empty() {
        msg.push_str("\nFound:");
        for path in found {
            msg.push_str(&format!("\n  {}", pretty_path(&path)));
        }
    }
    Err(AppError::new(2, msg))
}

/// Validate the provided path points to a `.npy` file.
pub fn validate_npy_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(
            2,
            format!("Dataset file not found: {}", path.display()),
        ));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if !has_npy_extension(path) {
        return Err(AppError::new(
            2,
            format!("Expected a .npy file (got: {}).", path.display()),
        ));
    }

    Ok(path.to_path_buf())
}

/// Discover `*.npy` files under the current directory (deterministic order).
pub fn discover_npy_files() -> Vec<PathBuf> {
    find_npy_files(Path::new("."), DEFAULT_SEARCH_DEPTH)
}

fn find_npy_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    find_npy_files_inner(root, 0, max_depth, &mut out);
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn find_npy_files_inner(root: &Path, depth: usize, max_depth: usize, out: &mut Vec<PathBuf>) {
    if depth > max_depth {
        return;
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if !should_skip_dir(&path) {
                find_npy_files_inner(&path, depth + 1, max_depth, out);
            }
        } else if file_type.is_file() && has_npy_extension(&path) {
            out.push(path);
        }
    }
}

fn has_npy_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("npy"))
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target" | "node_modules")
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}
