//! Model evaluation for the T1 / T2 signal equations.
//!
//! The fitter relies on three primitive operations:
//! - predict `y(t)` given parameters (for residuals/plots)
//! - fill a Jacobian row `∂y/∂p` (for Levenberg–Marquardt)
//! - build a design row for a fixed relaxation time (the model is linear in
//!   its remaining parameters, which the grid guess exploits)
//!
//! Parameter order follows `ModelKind::param_names`.

use crate::domain::ModelKind;

/// Predict `y(t)` for the given model kind.
pub fn predict(model: ModelKind, t: f64, params: &[f64]) -> f64 {
    let m0 = params[0];
    let e = (-t / params[1]).exp();
    match model {
        ModelKind::T1Ir => m0 * (1.0 - 2.0 * e),
        ModelKind::T1IrEfficiency => m0 * (1.0 - params[2] * e),
        ModelKind::T2Exp => m0 * e,
        ModelKind::T2Offset => m0 * e + params[2],
    }
}

/// Fill `out` with the partial derivatives of `y(t)` with respect to each parameter.
///
/// # Panics
/// Panics if `out` or `params` are shorter than `model.param_count()`.
pub fn fill_jacobian_row(model: ModelKind, t: f64, params: &[f64], out: &mut [f64]) {
    let m0 = params[0];
    let tau = params[1];
    let e = (-t / tau).exp();
    // d/dtau exp(-t/tau) = exp(-t/tau) * t / tau^2
    let de_dtau = e * t / (tau * tau);
    match model {
        ModelKind::T1Ir => {
            out[0] = 1.0 - 2.0 * e;
            out[1] = -2.0 * m0 * de_dtau;
        }
        ModelKind::T1IrEfficiency => {
            let a = params[2];
            out[0] = 1.0 - a * e;
            out[1] = -a * m0 * de_dtau;
            out[2] = -m0 * e;
        }
        ModelKind::T2Exp => {
            out[0] = e;
            out[1] = m0 * de_dtau;
        }
        ModelKind::T2Offset => {
            out[0] = e;
            out[1] = m0 * de_dtau;
            out[2] = 1.0;
        }
    }
}

/// Number of linear coefficients once the relaxation time is fixed.
pub fn linear_len(model: ModelKind) -> usize {
    model.param_count() - 1
}

/// Fill a design row for a fixed relaxation time `tau`.
pub fn fill_linear_row(model: ModelKind, t: f64, tau: f64, out: &mut [f64]) {
    let e = (-t / tau).exp();
    match model {
        ModelKind::T1Ir => out[0] = 1.0 - 2.0 * e,
        // m0 (1 - a e) = m0 - (m0 a) e
        ModelKind::T1IrEfficiency => {
            out[0] = 1.0;
            out[1] = -e;
        }
        ModelKind::T2Exp => out[0] = e,
        ModelKind::T2Offset => {
            out[0] = e;
            out[1] = 1.0;
        }
    }
}

/// Map linear coefficients back to the model's parameter vector.
///
/// Returns `None` when the mapping is undefined (e.g. `m0 = 0` with a free
/// inversion factor).
pub fn params_from_linear(model: ModelKind, tau: f64, coeffs: &[f64]) -> Option<Vec<f64>> {
    let params = match model {
        ModelKind::T1Ir | ModelKind::T2Exp => vec![coeffs[0], tau],
        ModelKind::T1IrEfficiency => {
            if coeffs[0].abs() < f64::EPSILON {
                return None;
            }
            vec![coeffs[0], tau, coeffs[1] / coeffs[0]]
        }
        ModelKind::T2Offset => vec![coeffs[0], tau, coeffs[1]],
    };
    if model.params_valid(&params) {
        Some(params)
    } else {
        None
    }
}
