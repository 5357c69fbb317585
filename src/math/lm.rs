//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ r_i(p)²` for a residual vector `r(p) = f(p) - y` with analytic
//! Jacobian `J = ∂f/∂p`, using the MINPACK port in the `levenberg-marquardt`
//! crate (the same `lmder` that backs `curve_fit`).
//!
//! Convergence tests:
//! - `ftol`: relative reduction of the sum of squares
//! - `xtol`: relative size of the scaled step
//! - `gtol`: cosine between the residual vector and every Jacobian column

use levenberg_marquardt::{
    LeastSquaresProblem as MinpackProblem, LevenbergMarquardt, TerminationReason,
};
use nalgebra::{DMatrix, DVector, Dyn, storage::Owned};

use crate::domain::Termination;
use crate::error::FitError;

/// MINPACK's default tolerance (`sqrt(machine epsilon)`).
pub const DEFAULT_TOLERANCE: f64 = 1.49012e-8;

/// A least-squares problem with `len()` residuals.
pub trait LeastSquaresProblem {
    fn len(&self) -> usize;

    /// Write `f(p) - y` into `out`.
    ///
    /// Returns `false` when `params` are outside the model's domain.
    fn residuals(&self, params: &[f64], out: &mut [f64]) -> bool;

    /// Write `∂f/∂p` (`len() x params.len()`) into `out`.
    fn jacobian(&self, params: &[f64], out: &mut DMatrix<f64>);
}

/// Optimizer settings.
#[derive(Debug, Clone)]
pub struct LmOptions {
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Evaluation budget is `patience * (p + 1)`.
    pub patience: usize,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            ftol: DEFAULT_TOLERANCE,
            xtol: DEFAULT_TOLERANCE,
            gtol: DEFAULT_TOLERANCE,
            patience: 200,
        }
    }
}

/// Converged optimizer state.
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    pub residuals: Vec<f64>,
    /// Jacobian evaluated at `params`.
    pub jacobian: DMatrix<f64>,
    pub sse: f64,
    pub evaluations: usize,
    pub termination: Termination,
}

/// Bridges a `LeastSquaresProblem` to the MINPACK solver, which owns the
/// current parameter vector.
struct Minpack<'a, P: ?Sized> {
    problem: &'a P,
    params: DVector<f64>,
}

impl<P: LeastSquaresProblem + ?Sized> MinpackProblem<f64, Dyn, Dyn> for Minpack<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.copy_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let mut out = vec![0.0; self.problem.len()];
        let valid = self.problem.residuals(self.params.as_slice(), &mut out)
            && out.iter().all(|v| v.is_finite());
        valid.then(|| DVector::from_vec(out))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let mut jac = DMatrix::<f64>::zeros(self.problem.len(), self.params.len());
        self.problem.jacobian(self.params.as_slice(), &mut jac);
        jac.iter().all(|v| v.is_finite()).then_some(jac)
    }
}

/// Run Levenberg–Marquardt from `initial`.
pub fn minimize<P: LeastSquaresProblem + ?Sized>(
    problem: &P,
    initial: &[f64],
    opts: &LmOptions,
) -> Result<LmSolution, FitError> {
    let n = problem.len();
    let p = initial.len();
    if p == 0 {
        return Err(FitError::InvalidInput("no parameters to fit".into()));
    }
    if n < p {
        return Err(FitError::TooFewPoints { n, params: p });
    }

    let start = Minpack {
        problem,
        params: DVector::from_column_slice(initial),
    };
    if start.residuals().is_none() {
        return Err(FitError::InvalidInput(
            "model is not finite at the initial guess".into(),
        ));
    }

    let solver = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_patience(opts.patience);
    let (fitted, report) = solver.minimize(start);
    let evaluations = report.number_of_evaluations;

    let termination = match report.termination {
        TerminationReason::ResidualsZero => Termination::ZeroResidual,
        TerminationReason::Orthogonal => Termination::Gradient,
        TerminationReason::Converged { ftol: true, .. } => Termination::Function,
        TerminationReason::Converged { .. } => Termination::Step,
        TerminationReason::LostPatience => return Err(FitError::NotConverged { evaluations }),
        TerminationReason::NoImprovementPossible(tolerance) => {
            return Err(FitError::Stalled { tolerance });
        }
        other => {
            return Err(FitError::InvalidInput(format!(
                "optimizer aborted: {other:?}"
            )));
        }
    };

    let residuals = fitted.residuals().ok_or_else(|| {
        FitError::InvalidInput("model is not finite at the solution".into())
    })?;
    let jacobian = fitted.jacobian().ok_or_else(|| {
        FitError::InvalidInput("model Jacobian is not finite at the solution".into())
    })?;
    let sse = residuals.norm_squared();
    tracing::debug!(evaluations, sse, ?termination, "levenberg-marquardt finished");

    Ok(LmSolution {
        params: fitted.params.iter().copied().collect(),
        residuals: residuals.iter().copied().collect(),
        jacobian,
        sse,
        evaluations,
        termination,
    })
}
