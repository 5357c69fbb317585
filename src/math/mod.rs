//! Mathematical utilities: linear least squares, Levenberg–Marquardt, and
//! parameter covariance.

pub mod covariance;
pub mod lm;
pub mod ols;

pub use covariance::*;
pub use lm::*;
pub use ols::*;
