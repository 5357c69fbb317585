//! Parametric maps: fit every voxel of a dataset.
//!
//! Each voxel is an independent fit, so the image is processed with a rayon
//! parallel iterator. Voxels whose largest absolute sample does not exceed the
//! threshold are skipped (background). Output layers are `(rows, cols, 2p)`
//! arrays: the `p` parameters followed by their `p` standard errors. Skipped
//! and failed voxels are NaN.
//!
//! Inversion-recovery models produce one layer per polarity hypothesis.

use ndarray::{Array3, s};
use rayon::prelude::*;

use crate::data::Dataset;
use crate::domain::{FitResult, Guess, Hypothesis, ModelKind, TimeBase};
use crate::error::FitError;
use crate::fit::fitter::fit_model;
use crate::fit::guess::resolve_guess;
use crate::fit::polarity::fit_inversion_recovery;
use crate::math::LmOptions;

/// One output array of a map run.
#[derive(Debug, Clone)]
pub struct MapLayer {
    /// `None` for decay models.
    pub hypothesis: Option<Hypothesis>,
    pub values: Array3<f64>,
    pub fitted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ParamMap {
    pub model: ModelKind,
    pub layers: Vec<MapLayer>,
    pub skipped: usize,
}

enum VoxelOutcome {
    Skipped,
    /// One entry per layer: `params ++ std_errors`, or `None` when that fit failed.
    Fitted(Vec<Option<Vec<f64>>>),
}

/// Fit `model` at every voxel above `threshold`.
pub fn fit_map(
    dataset: &Dataset,
    model: ModelKind,
    times: &TimeBase,
    guess: &Guess,
    threshold: f64,
    opts: &LmOptions,
) -> Result<ParamMap, FitError> {
    dataset.check_time_base(times)?;
    if !threshold.is_finite() {
        return Err(FitError::InvalidInput("map threshold must be finite".into()));
    }
    let p = model.param_count();
    if let Guess::Fixed(_) = guess {
        // Fail once up front instead of once per voxel.
        resolve_guess(guess, model, times, &vec![0.0; times.len()])?;
    }

    let source = if model.is_inversion_recovery() {
        dataset.magnitude()
    } else {
        dataset.clone()
    };
    let array = source.as_array();
    let (rows, cols, _) = source.shape();
    let hypotheses: Vec<Option<Hypothesis>> = if model.is_inversion_recovery() {
        Hypothesis::BOTH.iter().copied().map(Some).collect()
    } else {
        vec![None]
    };

    tracing::info!(rows, cols, model = %model, threshold, "fitting parametric map");

    let outcomes: Vec<(usize, VoxelOutcome)> = (0..rows * cols)
        .into_par_iter()
        .map(|idx| {
            let (r, c) = (idx / cols, idx % cols);
            let series = array.slice(s![r, c, ..]).to_vec();
            let peak = series.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            if peak <= threshold {
                return (idx, VoxelOutcome::Skipped);
            }
            let per_layer = if model.is_inversion_recovery() {
                match fit_inversion_recovery(model, times, &series, guess, opts) {
                    Ok(fit) => fit
                        .hypotheses()
                        .iter()
                        .map(|h| h.outcome.as_ref().ok().map(pack))
                        .collect(),
                    Err(_) => vec![None; 2],
                }
            } else {
                let outcome = resolve_guess(guess, model, times, &series)
                    .and_then(|start| fit_model(model, times, &series, &start, opts));
                vec![outcome.ok().as_ref().map(pack)]
            };
            (idx, VoxelOutcome::Fitted(per_layer))
        })
        .collect();

    let mut layers: Vec<MapLayer> = hypotheses
        .into_iter()
        .map(|hypothesis| MapLayer {
            hypothesis,
            values: Array3::from_elem((rows, cols, 2 * p), f64::NAN),
            fitted: 0,
            failed: 0,
        })
        .collect();
    let mut skipped = 0;

    for (idx, outcome) in outcomes {
        let (r, c) = (idx / cols, idx % cols);
        match outcome {
            VoxelOutcome::Skipped => skipped += 1,
            VoxelOutcome::Fitted(per_layer) => {
                for (layer, values) in layers.iter_mut().zip(per_layer) {
                    match values {
                        Some(values) => {
                            for (k, v) in values.into_iter().enumerate() {
                                layer.values[[r, c, k]] = v;
                            }
                            layer.fitted += 1;
                        }
                        None => layer.failed += 1,
                    }
                }
            }
        }
    }

    for layer in &layers {
        tracing::info!(
            hypothesis = ?layer.hypothesis,
            fitted = layer.fitted,
            failed = layer.failed,
            skipped,
            "map layer done"
        );
    }

    Ok(ParamMap {
        model,
        layers,
        skipped,
    })
}

fn pack(fit: &FitResult) -> Vec<f64> {
    fit.params.iter().chain(&fit.std_errors).copied().collect()
}
