//! Capability seams between the numeric pipeline and the terminal.
//!
//! The pipeline asks a `VoxelPicker` for a coordinate and hands results to a
//! `FitViewer`; it never talks to a terminal itself. Non-interactive
//! implementations live here, the ratatui ones in `tui`.

use std::io::{self, Write};

use crate::cli::picker::{prompt_for_voxel, render_slice_preview};
use crate::data::Dataset;
use crate::domain::{AmbiguousT1Fit, FitResult, TimeBase, Voxel};
use crate::error::AppError;
use crate::plot::{render_fit_plot, render_series_plot};

/// Chooses the voxel to fit.
pub trait VoxelPicker {
    fn pick(&mut self, dataset: &Dataset, times: &TimeBase) -> Result<Voxel, AppError>;
}

/// Shows computed fits. Blocks until the user is done with them.
pub trait FitViewer {
    fn show(&mut self, view: &FitView<'_>) -> Result<(), AppError>;
}

/// What a viewer gets to show.
#[derive(Debug, Clone, Copy)]
pub enum FitView<'a> {
    Single {
        voxel: Voxel,
        times: &'a TimeBase,
        series: &'a [f64],
        fit: &'a FitResult,
    },
    /// Both polarity hypotheses of a magnitude inversion-recovery fit.
    Ambiguous {
        voxel: Voxel,
        times: &'a TimeBase,
        fit: &'a AmbiguousT1Fit,
    },
}

/// A coordinate given up front (`--voxel`).
#[derive(Debug, Clone, Copy)]
pub struct FixedVoxel(pub Voxel);

impl VoxelPicker for FixedVoxel {
    fn pick(&mut self, dataset: &Dataset, _times: &TimeBase) -> Result<Voxel, AppError> {
        let (rows, cols, _) = dataset.shape();
        let v = self.0;
        if v.row >= rows || v.col >= cols {
            return Err(AppError::new(
                2,
                format!("Voxel {v} is outside the {rows}x{cols} image."),
            ));
        }
        Ok(v)
    }
}

/// Prints a shaded preview of the first time slice and reads `ROW,COL` from stdin.
#[derive(Debug, Default)]
pub struct PromptPicker;

impl VoxelPicker for PromptPicker {
    fn pick(&mut self, dataset: &Dataset, _times: &TimeBase) -> Result<Voxel, AppError> {
        let (rows, cols, _) = dataset.shape();
        let mut stdout = io::stdout();
        write!(stdout, "{}", render_slice_preview(dataset.first_slice(), 96))
            .map_err(|e| AppError::new(2, format!("Failed to write preview: {e}")))?;
        prompt_for_voxel(&mut io::stdin().lock(), &mut stdout, rows, cols)
    }
}

/// Writes ASCII plots.
pub struct AsciiViewer<W: Write> {
    out: W,
    width: usize,
    height: usize,
}

impl AsciiViewer<io::Stdout> {
    pub fn stdout(width: usize, height: usize) -> Self {
        Self::new(io::stdout(), width, height)
    }
}

impl<W: Write> AsciiViewer<W> {
    pub fn new(out: W, width: usize, height: usize) -> Self {
        Self { out, width, height }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> FitViewer for AsciiViewer<W> {
    fn show(&mut self, view: &FitView<'_>) -> Result<(), AppError> {
        let text = render_view(view, self.width, self.height);
        self.out
            .write_all(text.as_bytes())
            .map_err(|e| AppError::new(2, format!("Failed to write plot: {e}")))
    }
}

fn render_view(view: &FitView<'_>, width: usize, height: usize) -> String {
    match *view {
        FitView::Single {
            voxel,
            times,
            series,
            fit,
        } => format!(
            "\n{} at voxel {voxel}\n{}",
            fit.model.display_name(),
            render_fit_plot(times, series, fit, width, height)
        ),
        FitView::Ambiguous { voxel, times, fit } => {
            let mut out = String::new();
            for h in fit.hypotheses() {
                out.push_str(&format!("\nHypothesis {} at voxel {voxel}\n", h.hypothesis.label()));
                match &h.outcome {
                    Ok(result) => out.push_str(&render_fit_plot(times, &h.signed, result, width, height)),
                    Err(err) => {
                        out.push_str(&format!("(fit failed: {err})\n"));
                        out.push_str(&render_series_plot(times, &h.signed, width, height));
                    }
                }
            }
            out
        }
    }
}

/// Shows nothing.
#[derive(Debug, Default)]
pub struct NoViewer;

impl FitViewer for NoViewer {
    fn show(&mut self, _view: &FitView<'_>) -> Result<(), AppError> {
        Ok(())
    }
}
