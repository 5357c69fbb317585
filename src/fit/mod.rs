//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - fit one model to one series (`fitter`)
//! - unfold magnitude inversion-recovery data under both polarity hypotheses (`polarity`)
//! - derive starting points from the data (`guess`)
//! - fit every voxel of a dataset (parallel) (`map`)

pub mod fitter;
pub mod guess;
pub mod map;
pub mod polarity;

pub use fitter::*;
pub use guess::*;
pub use map::*;
pub use polarity::*;
