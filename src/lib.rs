//! `relaxfit` library crate.
//!
//! The binary (`relax`) is a thin wrapper around this library so that:
//!
//! - the fitting core is testable without spawning processes
//! - pickers and viewers plug into one pipeline (`interact`)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod interact;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
