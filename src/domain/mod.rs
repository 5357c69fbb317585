//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - acquisition inputs (`TimeBase`, `Voxel`, `Guess`)
//! - model kinds and polarity hypotheses (`ModelKind`, `Hypothesis`)
//! - fit outputs (`FitResult`, `AmbiguousT1Fit`, `FitFile`)
//! - per-command configuration (`RunConfig`, `MapConfig`, `PhantomConfig`)

pub mod types;

pub use types::*;
