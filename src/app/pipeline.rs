//! The pure fit pipeline shared by every front-end.
//!
//! `load_dataset -> extract_series -> fit_model` (or the two-hypothesis
//! inversion-recovery fit). Nothing here touches the terminal; pickers and
//! viewers are handed in or applied by the caller.

use std::path::Path;

use crate::data::{Dataset, extract_series};
use crate::domain::{AmbiguousT1Fit, FitResult, RunConfig, TimeBase, Voxel};
use crate::error::AppError;
use crate::fit::{fit_inversion_recovery, fit_model, resolve_guess};
use crate::interact::FitView;
use crate::math::LmOptions;

/// Load a dataset and check it against the run's time base.
pub fn load_dataset(path: &Path, times: &TimeBase) -> Result<Dataset, AppError> {
    let dataset = crate::io::load_dataset(path)?;
    dataset.check_time_base(times)?;
    Ok(dataset)
}

/// What was fitted at a voxel.
#[derive(Debug, Clone)]
pub enum VoxelFit {
    Decay {
        series: Vec<f64>,
        fit: FitResult,
    },
    InversionRecovery {
        /// `|series|`, the input of both hypotheses.
        magnitude: Vec<f64>,
        fit: AmbiguousT1Fit,
    },
}

/// All computed outputs of a single-voxel run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub voxel: Voxel,
    pub times: TimeBase,
    pub result: VoxelFit,
}

impl RunOutput {
    pub fn view(&self) -> FitView<'_> {
        match &self.result {
            VoxelFit::Decay { series, fit } => FitView::Single {
                voxel: self.voxel,
                times: &self.times,
                series,
                fit,
            },
            VoxelFit::InversionRecovery { fit, .. } => FitView::Ambiguous {
                voxel: self.voxel,
                times: &self.times,
                fit,
            },
        }
    }

    /// True when no fit at all succeeded.
    pub fn all_failed(&self) -> bool {
        match &self.result {
            VoxelFit::Decay { .. } => false,
            VoxelFit::InversionRecovery { fit, .. } => fit.hypotheses().iter().all(|h| h.outcome.is_err()),
        }
    }
}

/// Fit the configured model at one voxel.
pub fn fit_voxel(config: &RunConfig, dataset: &Dataset, voxel: Voxel) -> Result<RunOutput, AppError> {
    let series = extract_series(dataset, voxel)?;
    let opts = LmOptions::default();
    let model = config.model;

    let result = if model.is_inversion_recovery() {
        let magnitude: Vec<f64> = series.iter().map(|v| v.abs()).collect();
        let fit = fit_inversion_recovery(model, &config.times, &magnitude, &config.guess, &opts)?;
        VoxelFit::InversionRecovery { magnitude, fit }
    } else {
        let start = resolve_guess(&config.guess, model, &config.times, &series)?;
        let fit = fit_model(model, &config.times, &series, &start, &opts)?;
        VoxelFit::Decay { series, fit }
    };

    Ok(RunOutput {
        voxel,
        times: config.times.clone(),
        result,
    })
}
