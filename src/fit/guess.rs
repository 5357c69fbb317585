//! Initial guesses.
//!
//! A fixed guess comes straight from the command line. `Guess::Auto` derives one
//! from the data with a deterministic grid search over the relaxation time:
//!
//! - for a fixed `T`, every model here is linear in its remaining parameters
//! - so each grid point is a small linear least-squares problem
//! - the lowest-SSE grid point seeds Levenberg–Marquardt
//!
//! Why grid search?
//! - It avoids local minima issues when a fixed starting point is far off.
//! - It is deterministic given the same inputs.

use nalgebra::{DMatrix, DVector};

use crate::domain::{Guess, ModelKind, TimeBase};
use crate::error::FitError;
use crate::math::solve_least_squares;
use crate::models::{fill_linear_row, linear_len, params_from_linear, predict};

/// Number of grid points used for `Guess::Auto`.
pub const DEFAULT_GRID_STEPS: usize = 60;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, FitError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(FitError::InvalidInput(format!(
            "invalid grid range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(FitError::InvalidInput("grid steps must be >= 2".into()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// Relaxation-time search range for a time base: a decade below
/// `max(|shortest time|, longest time / 1000)` to a decade above the longest.
pub fn relaxation_range(times: &TimeBase) -> (f64, f64) {
    let lo = times.first().abs().max(times.last() * 1e-3).max(f64::MIN_POSITIVE);
    (lo * 0.1, times.last() * 10.0)
}

/// Grid-search starting parameters for `model` on a (signed) series.
pub fn grid_guess(
    model: ModelKind,
    times: &TimeBase,
    series: &[f64],
    steps: usize,
) -> Result<Vec<f64>, FitError> {
    if series.len() != times.len() {
        return Err(FitError::ShapeMismatch {
            what: "series",
            expected: times.len(),
            got: series.len(),
        });
    }
    let (min, max) = relaxation_range(times);
    let grid = log_space(min, max, steps)?;

    let n = series.len();
    let k = linear_len(model);
    let y = DVector::from_column_slice(series);
    let mut row = vec![0.0; k];

    let mut best: Option<(f64, Vec<f64>)> = None;
    for &tau in &grid {
        let mut x = DMatrix::<f64>::zeros(n, k);
        for (i, &t) in times.as_slice().iter().enumerate() {
            fill_linear_row(model, t, tau, &mut row);
            for (j, &g) in row.iter().enumerate() {
                x[(i, j)] = g;
            }
        }
        let Some(coeffs) = solve_least_squares(&x, &y) else {
            continue;
        };
        let Some(params) = params_from_linear(model, tau, coeffs.as_slice()) else {
            continue;
        };
        let sse: f64 = times
            .as_slice()
            .iter()
            .zip(series)
            .map(|(&t, &v)| {
                let r = v - predict(model, t, &params);
                r * r
            })
            .sum();
        if !sse.is_finite() {
            continue;
        }
        // Strict comparison keeps the earliest grid point on ties.
        if best.as_ref().is_none_or(|(b, _)| sse < *b) {
            best = Some((sse, params));
        }
    }

    best.map(|(_, params)| params).ok_or_else(|| {
        FitError::InvalidInput(format!(
            "no usable starting point for {} on the relaxation grid",
            model.display_name()
        ))
    })
}

/// Turn a user-facing guess into a starting parameter vector for `series`.
///
/// A fixed `(m0, T)` guess for a three-parameter model is completed with the
/// model's default for the extra parameter.
pub fn resolve_guess(
    guess: &Guess,
    model: ModelKind,
    times: &TimeBase,
    series: &[f64],
) -> Result<Vec<f64>, FitError> {
    match guess {
        Guess::Auto => grid_guess(model, times, series, DEFAULT_GRID_STEPS),
        Guess::Fixed(values) => {
            let p = model.param_count();
            if values.len() == p {
                return Ok(values.clone());
            }
            match model.extra_param_default() {
                Some(extra) if values.len() + 1 == p => {
                    let mut out = values.clone();
                    out.push(extra);
                    Ok(out)
                }
                _ => Err(FitError::InvalidInput(format!(
                    "{} needs {} starting values ({}), got {}",
                    model.display_name(),
                    p,
                    model.param_names().join(", "),
                    values.len()
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_ECHO_TIMES;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
        assert!(log_space(10.0, 1.0, 5).is_err());
        assert!(log_space(1.0, 10.0, 1).is_err());
    }

    #[test]
    fn relaxation_range_floors_tiny_first_times() {
        let te = TimeBase::new(vec![10.0, 250.0]).unwrap();
        assert_eq!(relaxation_range(&te), (1.0, 2500.0));
        // The floor is a thousandth of the longest time.
        let (lo, hi) = relaxation_range(&TimeBase::new(vec![0.0, 4000.0]).unwrap());
        assert!((lo - 0.4).abs() < 1e-12);
        assert_eq!(hi, 40000.0);
    }

    #[test]
    fn grid_guess_lands_near_true_t2() {
        let te = TimeBase::new(DEFAULT_ECHO_TIMES.to_vec()).unwrap();
        let y: Vec<f64> = te
            .as_slice()
            .iter()
            .map(|&t| predict(ModelKind::T2Exp, t, &[300.0, 45.0]))
            .collect();
        let g = grid_guess(ModelKind::T2Exp, &te, &y, DEFAULT_GRID_STEPS).unwrap();
        // Adjacent grid points are ~14% apart on this time base.
        assert!((g[1] - 45.0).abs() / 45.0 < 0.1, "T2 guess {}", g[1]);
        assert!((g[0] - 300.0).abs() / 300.0 < 0.2, "m0 guess {}", g[0]);
    }

    #[test]
    fn grid_guess_handles_free_inversion_factor() {
        let ti = TimeBase::new(vec![50.0, 100.0, 200.0, 500.0, 2000.0, 4000.0]).unwrap();
        let y: Vec<f64> = ti
            .as_slice()
            .iter()
            .map(|&t| predict(ModelKind::T1IrEfficiency, t, &[80.0, 1200.0, 1.9]))
            .collect();
        let g = grid_guess(ModelKind::T1IrEfficiency, &ti, &y, DEFAULT_GRID_STEPS).unwrap();
        assert_eq!(g.len(), 3);
        assert!((g[1] - 1200.0).abs() / 1200.0 < 0.1);
    }

    #[test]
    fn fixed_guess_is_completed_for_three_parameter_models() {
        let te = TimeBase::new(DEFAULT_ECHO_TIMES.to_vec()).unwrap();
        let y = vec![1.0; 6];
        let g = resolve_guess(&Guess::Fixed(vec![100.0, 100.0]), ModelKind::T2Offset, &te, &y).unwrap();
        assert_eq!(g, vec![100.0, 100.0, 0.0]);

        let g = resolve_guess(&Guess::Fixed(vec![100.0, 1000.0]), ModelKind::T1IrEfficiency, &te, &y).unwrap();
        assert_eq!(g, vec![100.0, 1000.0, 2.0]);

        assert!(resolve_guess(&Guess::Fixed(vec![1.0, 2.0, 3.0]), ModelKind::T2Exp, &te, &y).is_err());
    }
}
