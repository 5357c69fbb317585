//! Command-line parsing for the relaxometry fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code. Each command's arguments convert into one config struct
//! (`RunConfig`, `MapConfig`, `PhantomConfig`); the pipeline only sees those.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    Guess, MapConfig, ModelKind, PhantomConfig, PickerKind, Relaxation, RunConfig, TimeBase,
    ViewerKind, Voxel,
};
use crate::error::AppError;

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "relax", version, about = "MRI T1/T2 relaxometry curve fitting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit T1 at one voxel of an inversion-recovery dataset (both polarity hypotheses).
    T1(VoxelArgs),
    /// Fit T2 at one voxel of a spin echo dataset.
    T2(VoxelArgs),
    /// Fit every voxel and write parameter maps.
    Map(MapArgs),
    /// Write a synthetic phantom dataset.
    Simulate(SimulateArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
}

/// Options for single-voxel fits.
#[derive(Debug, Args, Clone)]
pub struct VoxelArgs {
    /// Dataset (`.npy`, axes row x column x time). Defaults to `t1dataset.npy` / `t2dataset.npy`.
    #[arg(short = 'd', long, value_name = "NPY")]
    pub data: Option<PathBuf>,

    /// Acquisition times in ms, comma separated. Defaults to the reference protocol.
    #[arg(short = 't', long, value_name = "T1,T2,...")]
    pub times: Option<TimeBase>,

    /// Voxel to fit; skips interactive picking.
    #[arg(long, value_name = "ROW,COL")]
    pub voxel: Option<Voxel>,

    /// Initial guess `m0,T[,extra]`, or `auto` for a grid search.
    #[arg(short = 'g', long)]
    pub guess: Option<Guess>,

    /// Signal model (`ir`, `ir-eff` for T1; `exp`, `exp-offset` for T2).
    #[arg(short = 'm', long, value_enum)]
    pub model: Option<ModelKind>,

    /// How to pick the voxel when `--voxel` is not given.
    #[arg(long, value_enum, default_value_t = PickerKind::Tui)]
    pub picker: PickerKind,

    /// How to show the fit.
    #[arg(long, value_enum, default_value_t = ViewerKind::Tui)]
    pub viewer: ViewerKind,

    /// ASCII plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// ASCII plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the fit (params + covariance + fitted grid) to JSON.
    ///
    /// T1 runs write one file per hypothesis (`<stem>_A.json`, `<stem>_B.json`).
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,

    /// Export per-sample residuals to CSV (T1: one file per hypothesis).
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,
}

/// Options for parameter maps.
#[derive(Debug, Args, Clone)]
pub struct MapArgs {
    #[arg(value_enum)]
    pub relaxation: Relaxation,

    /// Dataset (`.npy`). Defaults to `t1dataset.npy` / `t2dataset.npy`.
    #[arg(short = 'd', long, value_name = "NPY")]
    pub data: Option<PathBuf>,

    /// Output `.npy`; T1 writes `<stem>_A.npy` and `<stem>_B.npy`.
    #[arg(short = 'o', long, value_name = "NPY")]
    pub out: PathBuf,

    /// Skip voxels whose largest absolute sample does not exceed this.
    #[arg(long, default_value_t = 5.0)]
    pub threshold: f64,

    #[arg(short = 't', long, value_name = "T1,T2,...")]
    pub times: Option<TimeBase>,

    /// Initial guess `m0,T[,extra]` or `auto`.
    #[arg(short = 'g', long, default_value = "auto")]
    pub guess: Guess,

    #[arg(short = 'm', long, value_enum)]
    pub model: Option<ModelKind>,
}

/// Options for phantom generation.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[arg(value_enum)]
    pub relaxation: Relaxation,

    #[arg(short = 'o', long, value_name = "NPY")]
    pub out: PathBuf,

    #[arg(long, default_value_t = 48)]
    pub rows: usize,

    #[arg(long, default_value_t = 48)]
    pub cols: usize,

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(short = 't', long, value_name = "T1,T2,...")]
    pub times: Option<TimeBase>,
}

/// Options for plotting a saved fit.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Fit JSON file produced by `relax t1|t2 --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// Resolve the model for a relaxation, rejecting models of the other kind.
pub fn resolve_model(relaxation: Relaxation, model: Option<ModelKind>) -> Result<ModelKind, AppError> {
    let model = model.unwrap_or_else(|| relaxation.default_model());
    if model.relaxation() != relaxation {
        return Err(AppError::new(
            2,
            format!(
                "Model '{}' cannot fit {} data.",
                model.display_name(),
                relaxation.label()
            ),
        ));
    }
    Ok(model)
}

/// Build the single-voxel run config.
pub fn run_config(relaxation: Relaxation, args: &VoxelArgs) -> Result<RunConfig, AppError> {
    let model = resolve_model(relaxation, args.model)?;
    let data = picker::resolve_data_path(args.data.as_deref(), relaxation)?;
    Ok(RunConfig {
        data,
        model,
        times: args.times.clone().unwrap_or_else(|| relaxation.default_times()),
        guess: args
            .guess
            .clone()
            .unwrap_or_else(|| Guess::Fixed(model.default_guess())),
        voxel: args.voxel,
        picker: args.picker,
        viewer: args.viewer,
        plot_width: args.width,
        plot_height: args.height,
        export_fit: args.export_fit.clone(),
        export_csv: args.export_csv.clone(),
    })
}

/// Build the map config.
pub fn map_config(args: &MapArgs) -> Result<MapConfig, AppError> {
    let model = resolve_model(args.relaxation, args.model)?;
    let data = picker::resolve_data_path(args.data.as_deref(), args.relaxation)?;
    Ok(MapConfig {
        data,
        out: args.out.clone(),
        model,
        times: args.times.clone().unwrap_or_else(|| args.relaxation.default_times()),
        guess: args.guess.clone(),
        threshold: args.threshold,
    })
}

/// Build the phantom config.
pub fn phantom_config(args: &SimulateArgs) -> PhantomConfig {
    PhantomConfig {
        relaxation: args.relaxation,
        out: args.out.clone(),
        rows: args.rows,
        cols: args.cols,
        times: args.times.clone().unwrap_or_else(|| args.relaxation.default_times()),
        noise: args.noise,
        seed: args.seed,
    }
}
