//! Parameter covariance of a nonlinear least-squares fit.
//!
//! `cov = pinv(JᵀJ) · SSE / (n - p)`, with the pseudo-inverse taken from the SVD
//! of `J` itself (singular values below `ε · max(n, p) · s_max` are dropped).
//! With `n == p` there are no residual degrees of freedom and every entry is `+inf`.

use nalgebra::DMatrix;

/// Estimate the covariance matrix from the Jacobian at the solution.
pub fn covariance_from_jacobian(jac: &DMatrix<f64>, sse: f64) -> DMatrix<f64> {
    let (n, p) = jac.shape();
    if n <= p {
        tracing::warn!(n, p, "covariance of the parameters could not be estimated");
        return DMatrix::from_element(p, p, f64::INFINITY);
    }

    let svd = jac.clone().svd(false, true);
    let Some(v_t) = svd.v_t.as_ref() else {
        return DMatrix::from_element(p, p, f64::INFINITY);
    };
    let s_max = svd.singular_values.max();
    let threshold = f64::EPSILON * n.max(p) as f64 * s_max;

    let mut cov = DMatrix::<f64>::zeros(p, p);
    for (k, &s) in svd.singular_values.iter().enumerate() {
        if s <= threshold {
            continue;
        }
        let v = v_t.row(k).transpose();
        cov += (&v * v.transpose()) / (s * s);
    }

    cov * (sse / (n - p) as f64)
}

/// Per-parameter standard errors, `sqrt(diag(cov))`.
pub fn standard_errors(cov: &DMatrix<f64>) -> Vec<f64> {
    cov.diagonal().iter().map(|v| v.max(0.0).sqrt()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covariance_matches_linear_regression_formula() {
        // Straight line y = a + b x; cov = s² (XᵀX)⁻¹.
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let sse = 2.0;
        let cov = covariance_from_jacobian(&x, sse);

        let xtx_inv = (x.transpose() * &x).try_inverse().unwrap();
        let expected = xtx_inv * (sse / 2.0);
        for i in 0..2 {
            for j in 0..2 {
                assert!((cov[(i, j)] - expected[(i, j)]).abs() < 1e-12);
            }
        }
        let se = standard_errors(&cov);
        assert!(se.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn square_system_has_infinite_covariance() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let cov = covariance_from_jacobian(&x, 0.0);
        assert!(cov.iter().all(|v| v.is_infinite()));
        assert!(standard_errors(&cov).iter().all(|v| v.is_infinite()));
    }

    #[test]
    fn rank_deficient_jacobian_drops_null_direction() {
        // Second column duplicates the first; the null direction is dropped, not inverted.
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        let cov = covariance_from_jacobian(&x, 1.0);
        assert!(cov.iter().all(|v| v.is_finite()));
    }
}
