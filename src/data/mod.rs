//! Signal datasets: the in-memory 3D array and a synthetic phantom generator.

pub mod dataset;
pub mod phantom;

pub use dataset::*;
pub use phantom::*;
