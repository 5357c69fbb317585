//! Error types.
//!
//! - `FitError` is the typed error of the numeric core (`math`, `fit`).
//! - `AppError` is what the binary reports: a message plus a process exit code.
//!
//! Exit codes: `2` usage / IO / point selection, `3` data shape, `4` fit failure.

use thiserror::Error;

/// Failure modes of a least-squares fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("shape mismatch: {what} has {got} samples, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("too few points: {n} samples cannot determine {params} parameters")]
    TooFewPoints { n: usize, params: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("fit did not converge within {evaluations} evaluations")]
    NotConverged { evaluations: usize },
    #[error("fit stalled: no further reduction possible at the {tolerance} tolerance")]
    Stalled { tolerance: &'static str },
}

impl FitError {
    /// Exit code used when this error terminates the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::ShapeMismatch { .. } | FitError::TooFewPoints { .. } => 3,
            FitError::InvalidInput(_) => 2,
            FitError::NotConverged { .. } | FitError::Stalled { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_error_maps_to_exit_codes() {
        let shape: AppError = FitError::ShapeMismatch {
            what: "series",
            expected: 6,
            got: 5,
        }
        .into();
        assert_eq!(shape.exit_code(), 3);
        assert!(shape.to_string().contains("expected 6"));

        let conv: AppError = FitError::NotConverged { evaluations: 600 }.into();
        assert_eq!(conv.exit_code(), 4);
    }
}
