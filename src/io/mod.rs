//! Input/output helpers.
//!
//! - `.npy` datasets and parameter maps (`npy`)
//! - fit JSON read/write (`fitfile`)
//! - residual CSV export (`export`)

use std::path::{Path, PathBuf};

use crate::domain::Hypothesis;

pub mod export;
pub mod fitfile;
pub mod npy;

pub use export::*;
pub use fitfile::*;
pub use npy::*;

/// Output path for one polarity hypothesis: `<stem>_A.<ext>` / `<stem>_B.<ext>`.
///
/// Without a hypothesis the path is returned unchanged.
pub fn hypothesis_path(path: &Path, hypothesis: Option<Hypothesis>) -> PathBuf {
    let Some(h) = hypothesis else {
        return path.to_path_buf();
    };
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fit".to_string());
    let suffix = match h {
        Hypothesis::A => "A",
        Hypothesis::B => "B",
    };
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{suffix}"),
    };
    path.with_file_name(name)
}
