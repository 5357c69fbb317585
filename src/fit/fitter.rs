//! Single-series fitting: `curve_fit` semantics for one model kind.
//!
//! Given:
//! - acquisition times `t_i`
//! - observed values `y_i`
//! - an initial parameter guess
//!
//! we run Levenberg–Marquardt from the guess and return the parameters, their
//! covariance and standard errors. There is no retry with another starting point:
//! a non-converging fit is an error.

use nalgebra::DMatrix;

use crate::domain::{FitQuality, FitResult, ModelKind, TimeBase};
use crate::error::FitError;
use crate::math::{
    LeastSquaresProblem, LmOptions, covariance_from_jacobian, minimize, standard_errors,
};
use crate::models::{fill_jacobian_row, predict};

/// A model evaluated on one series.
struct CurveProblem<'a> {
    model: ModelKind,
    t: &'a [f64],
    y: &'a [f64],
}

impl LeastSquaresProblem for CurveProblem<'_> {
    fn len(&self) -> usize {
        self.t.len()
    }

    fn residuals(&self, params: &[f64], out: &mut [f64]) -> bool {
        if !self.model.params_valid(params) {
            return false;
        }
        for (i, (&t, &y)) in self.t.iter().zip(self.y).enumerate() {
            out[i] = predict(self.model, t, params) - y;
        }
        true
    }

    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>) {
        let mut row = vec![0.0; params.len()];
        for (i, &t) in self.t.iter().enumerate() {
            fill_jacobian_row(self.model, t, params, &mut row);
            for (j, &d) in row.iter().enumerate() {
                out[(i, j)] = d;
            }
        }
    }
}

/// Check that a series can be fitted against a time base with a given model.
pub fn validate_series(model: ModelKind, times: &TimeBase, series: &[f64]) -> Result<(), FitError> {
    if series.len() != times.len() {
        return Err(FitError::ShapeMismatch {
            what: "series",
            expected: times.len(),
            got: series.len(),
        });
    }
    if series.len() < model.param_count() {
        return Err(FitError::TooFewPoints {
            n: series.len(),
            params: model.param_count(),
        });
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(FitError::InvalidInput("series contains non-finite samples".into()));
    }
    Ok(())
}

/// Fit `model` to `series` starting from `guess`.
pub fn fit_model(
    model: ModelKind,
    times: &TimeBase,
    series: &[f64],
    guess: &[f64],
    opts: &LmOptions,
) -> Result<FitResult, FitError> {
    validate_series(model, times, series)?;
    if guess.len() != model.param_count() {
        return Err(FitError::InvalidInput(format!(
            "{} needs {} starting values ({}), got {}",
            model.display_name(),
            model.param_count(),
            model.param_names().join(", "),
            guess.len()
        )));
    }

    let problem = CurveProblem {
        model,
        t: times.as_slice(),
        y: series,
    };
    let solution = minimize(&problem, guess, opts)?;

    let covariance = covariance_from_jacobian(&solution.jacobian, solution.sse);
    let std_errors = standard_errors(&covariance);
    let n = series.len();

    Ok(FitResult {
        model,
        params: solution.params,
        covariance,
        std_errors,
        quality: FitQuality {
            sse: solution.sse,
            rmse: (solution.sse / n as f64).sqrt(),
            n,
        },
        evaluations: solution.evaluations,
        termination: solution.termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_ECHO_TIMES;

    fn echo_times() -> TimeBase {
        TimeBase::new(DEFAULT_ECHO_TIMES.to_vec()).unwrap()
    }

    fn synth(model: ModelKind, times: &TimeBase, params: &[f64]) -> Vec<f64> {
        times.as_slice().iter().map(|&t| predict(model, t, params)).collect()
    }

    #[test]
    fn t2_fit_recovers_reference_curve() {
        let te = echo_times();
        let y = synth(ModelKind::T2Exp, &te, &[100.0, 100.0]);
        let fit = fit_model(ModelKind::T2Exp, &te, &y, &[100.0, 100.0], &LmOptions::default()).unwrap();
        assert!((fit.m0() - 100.0).abs() < 1.0);
        assert!((fit.relaxation_time() - 100.0).abs() < 1.0);
    }

    #[test]
    fn t2_fit_converges_from_distant_guess() {
        let te = echo_times();
        let y = synth(ModelKind::T2Exp, &te, &[250.0, 65.0]);
        let fit = fit_model(ModelKind::T2Exp, &te, &y, &[100.0, 100.0], &LmOptions::default()).unwrap();
        assert!((fit.m0() - 250.0).abs() / 250.0 < 1e-3, "m0 = {}", fit.m0());
        assert!((fit.relaxation_time() - 65.0).abs() / 65.0 < 1e-3, "T2 = {}", fit.relaxation_time());
        assert!(fit.quality.rmse < 1e-4);
    }

    #[test]
    fn noisy_fit_has_finite_non_negative_errors() {
        let te = echo_times();
        let mut y = synth(ModelKind::T2Exp, &te, &[120.0, 80.0]);
        let noise = [0.8, -1.1, 0.4, 0.9, -0.6, 0.3];
        for (v, n) in y.iter_mut().zip(noise) {
            *v += n;
        }
        let fit = fit_model(ModelKind::T2Exp, &te, &y, &[100.0, 100.0], &LmOptions::default()).unwrap();
        assert_eq!(fit.std_errors.len(), 2);
        for se in &fit.std_errors {
            assert!(se.is_finite() && *se >= 0.0);
        }
        assert!(fit.std_errors[1] > 0.0);
        assert!((fit.relaxation_time() - 80.0).abs() < 10.0);
        // Standard errors are the square roots of the covariance diagonal.
        for j in 0..2 {
            assert!((fit.std_errors[j] - fit.covariance[(j, j)].sqrt()).abs() < 1e-12);
        }
    }

    #[test]
    fn t2_offset_model_recovers_noise_floor() {
        let te = TimeBase::new((1..=10).map(|i| i as f64 * 20.0).collect()).unwrap();
        let y = synth(ModelKind::T2Offset, &te, &[100.0, 60.0, 5.0]);
        let fit = fit_model(ModelKind::T2Offset, &te, &y, &[90.0, 80.0, 0.0], &LmOptions::default()).unwrap();
        assert!((fit.params[2] - 5.0).abs() < 1e-3, "c = {}", fit.params[2]);
        assert!((fit.relaxation_time() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn length_mismatch_is_a_shape_error() {
        let te = echo_times();
        let err = fit_model(ModelKind::T2Exp, &te, &[1.0, 2.0, 3.0], &[100.0, 100.0], &LmOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            FitError::ShapeMismatch {
                what: "series",
                expected: 6,
                got: 3
            }
        );
    }

    #[test]
    fn guess_length_must_match_model() {
        let te = echo_times();
        let y = synth(ModelKind::T2Exp, &te, &[100.0, 100.0]);
        let err = fit_model(ModelKind::T2Exp, &te, &y, &[100.0], &LmOptions::default()).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
    }

    #[test]
    fn exactly_determined_fit_reports_infinite_errors() {
        let te = TimeBase::new(vec![10.0, 40.0]).unwrap();
        let y = synth(ModelKind::T2Exp, &te, &[100.0, 50.0]);
        let fit = fit_model(ModelKind::T2Exp, &te, &y, &[90.0, 60.0], &LmOptions::default()).unwrap();
        assert!((fit.relaxation_time() - 50.0).abs() < 1e-4);
        assert!(fit.std_errors.iter().all(|v| v.is_infinite()));
    }
}
