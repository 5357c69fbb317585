//! Polarity unfolding for magnitude inversion-recovery data.
//!
//! The true IR signal `m0 (1 - 2 exp(-t/T1))` starts negative and crosses zero,
//! but magnitude images fold the negative part up. The sample with the smallest
//! magnitude marks the likely zero crossing:
//!
//! - everything before it was certainly negative
//! - the minimum itself may be on either side of the crossing
//!
//! So we build two signed series (hypothesis A: minimum positive, hypothesis B:
//! minimum negative), fit both, and return both. Magnitude data alone cannot
//! decide between them; that needs outside information such as phase.

use crate::domain::{AmbiguousT1Fit, Guess, Hypothesis, HypothesisFit, ModelKind, TimeBase};
use crate::error::FitError;
use crate::fit::fitter::{fit_model, validate_series};
use crate::fit::guess::resolve_guess;
use crate::math::LmOptions;

/// Index of the smallest sample (first occurrence on ties).
///
/// Returns `None` for an empty series.
pub fn min_index(series: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in series.iter().enumerate() {
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Negate the samples before `k` (`inclusive` also negates `k` itself).
pub fn flip_before(series: &[f64], k: usize, inclusive: bool) -> Vec<f64> {
    let end = if inclusive { k + 1 } else { k };
    series
        .iter()
        .enumerate()
        .map(|(i, &v)| if i < end { -v } else { v })
        .collect()
}

/// Signed series for a hypothesis.
pub fn apply_hypothesis(series: &[f64], min_index: usize, hypothesis: Hypothesis) -> Vec<f64> {
    flip_before(series, min_index, hypothesis.includes_minimum())
}

/// Fit both polarity hypotheses of a magnitude IR series.
///
/// Input-level problems (shape, non-finite samples, bad guess) fail the whole call.
/// A fit that does not converge only fails its own hypothesis. `Guess::Auto` is
/// resolved separately on each signed series.
pub fn fit_inversion_recovery(
    model: ModelKind,
    times: &TimeBase,
    magnitude: &[f64],
    guess: &Guess,
    opts: &LmOptions,
) -> Result<AmbiguousT1Fit, FitError> {
    if !model.is_inversion_recovery() {
        return Err(FitError::InvalidInput(format!(
            "{} is not an inversion-recovery model",
            model.display_name()
        )));
    }
    validate_series(model, times, magnitude)?;
    if let Guess::Fixed(_) = guess {
        resolve_guess(guess, model, times, magnitude)?;
    }

    let min_index = min_index(magnitude).ok_or(FitError::TooFewPoints {
        n: 0,
        params: model.param_count(),
    })?;

    let fit_one = |hypothesis: Hypothesis| {
        let signed = apply_hypothesis(magnitude, min_index, hypothesis);
        let outcome = resolve_guess(guess, model, times, &signed)
            .and_then(|start| fit_model(model, times, &signed, &start, opts));
        if let Err(err) = &outcome {
            tracing::warn!(?hypothesis, %err, "inversion-recovery hypothesis failed");
        }
        HypothesisFit {
            hypothesis,
            signed,
            outcome,
        }
    };

    Ok(AmbiguousT1Fit {
        min_index,
        a: fit_one(Hypothesis::A),
        b: fit_one(Hypothesis::B),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_INVERSION_TIMES;
    use crate::models::predict;

    fn magnitude_ir(times: &TimeBase, m0: f64, t1: f64) -> Vec<f64> {
        times
            .as_slice()
            .iter()
            .map(|&t| predict(ModelKind::T1Ir, t, &[m0, t1]).abs())
            .collect()
    }

    fn recovers(fit: &HypothesisFit, m0: f64, t1: f64, rel: f64) -> bool {
        match &fit.outcome {
            Ok(r) => (r.m0() - m0).abs() / m0 < rel && (r.relaxation_time() - t1).abs() / t1 < rel,
            Err(_) => false,
        }
    }

    #[test]
    fn min_index_picks_first_minimum() {
        assert_eq!(min_index(&[5.0, 3.0, 1.0, 4.0, 9.0]), Some(2));
        assert_eq!(min_index(&[2.0, 1.0, 1.0, 3.0]), Some(1));
        assert_eq!(min_index(&[0.5]), Some(0));
        assert_eq!(min_index(&[]), None);
    }

    #[test]
    fn min_index_on_folded_ir_curve() {
        let ti = TimeBase::new(DEFAULT_INVERSION_TIMES.to_vec()).unwrap();
        let mag = magnitude_ir(&ti, 100.0, 1000.0);
        // |s| = [90.2, 81.0, 63.7, 21.3, 72.9, 96.3]
        assert_eq!(min_index(&mag), Some(3));
    }

    #[test]
    fn flips_are_exclusive_and_inclusive() {
        let y = [4.0, 3.0, 1.0, 2.0];
        assert_eq!(flip_before(&y, 2, false), vec![-4.0, -3.0, 1.0, 2.0]);
        assert_eq!(flip_before(&y, 2, true), vec![-4.0, -3.0, -1.0, 2.0]);
        assert_eq!(flip_before(&y, 0, false), y.to_vec());
        assert_eq!(flip_before(&y, 3, true), vec![-4.0, -3.0, -1.0, -2.0]);
    }

    #[test]
    fn negative_minimum_is_recovered_by_hypothesis_b() {
        // The minimum (t=500) is still on the negative side of the crossing at ~693.
        let ti = TimeBase::new(DEFAULT_INVERSION_TIMES.to_vec()).unwrap();
        let mag = magnitude_ir(&ti, 100.0, 1000.0);
        let fit = fit_inversion_recovery(
            ModelKind::T1Ir,
            &ti,
            &mag,
            &Guess::Fixed(vec![100.0, 1000.0]),
            &LmOptions::default(),
        )
        .unwrap();

        assert_eq!(fit.min_index, 3);
        assert!(fit.a.signed[3] > 0.0);
        assert!(fit.b.signed[3] < 0.0);
        assert!(recovers(&fit.b, 100.0, 1000.0, 0.01));
        assert!(!recovers(&fit.a, 100.0, 1000.0, 0.01));
    }

    #[test]
    fn positive_minimum_is_recovered_by_hypothesis_a() {
        // Crossing at ~693; t=700 is the first positive sample and the smallest magnitude.
        let ti = TimeBase::new(vec![50.0, 100.0, 200.0, 700.0, 2000.0, 4000.0]).unwrap();
        let mag = magnitude_ir(&ti, 100.0, 1000.0);
        assert_eq!(min_index(&mag), Some(3));

        let fit = fit_inversion_recovery(
            ModelKind::T1Ir,
            &ti,
            &mag,
            &Guess::Fixed(vec![80.0, 700.0]),
            &LmOptions::default(),
        )
        .unwrap();

        assert!(recovers(&fit.a, 100.0, 1000.0, 1e-3));
        assert!(!recovers(&fit.b, 100.0, 1000.0, 1e-3));
    }

    #[test]
    fn failed_hypothesis_does_not_take_the_other_down() {
        let ti = TimeBase::new(DEFAULT_INVERSION_TIMES.to_vec()).unwrap();
        let mag = magnitude_ir(&ti, 100.0, 1000.0);
        // B starts exactly on its solution; A needs far more than three evaluations.
        let tight = LmOptions {
            patience: 1,
            ..LmOptions::default()
        };
        let fit = fit_inversion_recovery(ModelKind::T1Ir, &ti, &mag, &Guess::Fixed(vec![100.0, 1000.0]), &tight)
            .unwrap();

        assert!(matches!(fit.a.outcome, Err(FitError::NotConverged { .. })));
        assert!(recovers(&fit.b, 100.0, 1000.0, 1e-9));
        // The failed hypothesis still carries its signed series.
        assert!(fit.a.signed[3] > 0.0);
    }

    #[test]
    fn both_hypotheses_can_fail() {
        let ti = TimeBase::new(DEFAULT_INVERSION_TIMES.to_vec()).unwrap();
        let mag = magnitude_ir(&ti, 100.0, 1000.0);
        let tight = LmOptions {
            patience: 1,
            ..LmOptions::default()
        };
        let fit = fit_inversion_recovery(ModelKind::T1Ir, &ti, &mag, &Guess::Fixed(vec![50.0, 3000.0]), &tight)
            .unwrap();
        assert!(fit.hypotheses().iter().all(|h| h.outcome.is_err()));
        assert_eq!(fit.min_index, 3);
    }

    #[test]
    fn both_hypotheses_report_standard_errors() {
        let ti = TimeBase::new(DEFAULT_INVERSION_TIMES.to_vec()).unwrap();
        let mut mag = magnitude_ir(&ti, 100.0, 1000.0);
        mag[0] += 0.7;
        mag[4] -= 0.5;
        let fit = fit_inversion_recovery(
            ModelKind::T1Ir,
            &ti,
            &mag,
            &Guess::Fixed(vec![100.0, 1000.0]),
            &LmOptions::default(),
        )
        .unwrap();
        for h in fit.hypotheses() {
            if let Ok(r) = &h.outcome {
                assert!(r.std_errors.iter().all(|v| v.is_finite() && *v >= 0.0));
            }
        }
        assert!(fit.b.outcome.is_ok());
    }

    #[test]
    fn efficiency_model_recovers_imperfect_inversion() {
        let ti = TimeBase::new(vec![50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0]).unwrap();
        let mag: Vec<f64> = ti
            .as_slice()
            .iter()
            .map(|&t| predict(ModelKind::T1IrEfficiency, t, &[100.0, 900.0, 1.8]).abs())
            .collect();
        let fit = fit_inversion_recovery(
            ModelKind::T1IrEfficiency,
            &ti,
            &mag,
            &Guess::Fixed(vec![100.0, 1000.0, 2.0]),
            &LmOptions::default(),
        )
        .unwrap();
        let right = fit
            .hypotheses()
            .into_iter()
            .any(|h| recovers(h, 100.0, 900.0, 1e-3));
        assert!(right);
    }

    #[test]
    fn rejects_decay_model_and_bad_shapes() {
        let ti = TimeBase::new(DEFAULT_INVERSION_TIMES.to_vec()).unwrap();
        let mag = magnitude_ir(&ti, 100.0, 1000.0);
        assert!(matches!(
            fit_inversion_recovery(ModelKind::T2Exp, &ti, &mag, &Guess::Fixed(vec![100.0, 100.0]), &LmOptions::default()),
            Err(FitError::InvalidInput(_))
        ));
        assert!(matches!(
            fit_inversion_recovery(ModelKind::T1Ir, &ti, &mag[..4], &Guess::Fixed(vec![100.0, 1000.0]), &LmOptions::default()),
            Err(FitError::ShapeMismatch { .. })
        ));
    }
}
