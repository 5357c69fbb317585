//! Reporting utilities: residuals and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use std::path::PathBuf;

use crate::domain::{AmbiguousT1Fit, FitResult, Residual, TimeBase, Voxel};
use crate::error::AppError;
use crate::fit::ParamMap;

/// Compute fitted values and residuals for each sample.
pub fn compute_residuals(
    times: &TimeBase,
    series: &[f64],
    fit: &FitResult,
) -> Result<Vec<Residual>, AppError> {
    let mut out = Vec::with_capacity(series.len());
    for (&t, &y_obs) in times.as_slice().iter().zip(series) {
        let y_fit = fit.predict(t);
        if !y_fit.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        out.push(Residual {
            t,
            y_obs,
            y_fit,
            residual: y_obs - y_fit,
        });
    }
    Ok(out)
}

/// `T1: <value>, Param error [<m0 err>, <T1 err>]` (or `T2: ...`).
pub fn format_param_error_line(fit: &FitResult) -> String {
    format!(
        "{}: {}, Param error {}",
        fit.model.param_names()[1],
        fmt_num(fit.relaxation_time()),
        fmt_vec(&fit.std_errors)
    )
}

/// Parameter table plus fit diagnostics for one fit.
pub fn format_fit_block(fit: &FitResult) -> String {
    let mut out = String::new();
    for ((name, value), err) in fit
        .model
        .param_names()
        .iter()
        .zip(&fit.params)
        .zip(&fit.std_errors)
    {
        out.push_str(&format!("  {name:<3} = {:>12} ± {}\n", fmt_num(*value), fmt_num(*err)));
    }
    out.push_str(&format!("  {}\n", format_param_error_line(fit)));
    out.push_str(&format!(
        "  SSE={:.4} RMSE={:.4} n={} | {} evaluations, stopped on {:?}\n",
        fit.quality.sse, fit.quality.rmse, fit.quality.n, fit.evaluations, fit.termination
    ));
    out
}

/// Full summary of a single (decay) fit.
pub fn format_fit_summary(fit: &FitResult, voxel: Voxel) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== relax - {} ===\n", fit.model.display_name()));
    out.push_str(&format!("Voxel: {voxel}\n"));
    out.push_str(&format_fit_block(fit));
    out
}

/// Full summary of both inversion-recovery hypotheses.
pub fn format_t1_summary(fit: &AmbiguousT1Fit, times: &TimeBase, voxel: Voxel) -> String {
    let mut out = String::new();
    let model = fit
        .hypotheses()
        .iter()
        .find_map(|h| h.outcome.as_ref().ok().map(|r| r.model.display_name()))
        .unwrap_or("T1 inversion recovery");
    out.push_str(&format!("=== relax - {model} ===\n"));
    out.push_str(&format!("Voxel: {voxel}\n"));
    out.push_str(&format!(
        "Minimum magnitude at index {} (t = {})\n",
        fit.min_index,
        fmt_num(times.as_slice()[fit.min_index])
    ));
    for h in fit.hypotheses() {
        out.push_str(&format!("\nHypothesis {}:\n", h.hypothesis.label()));
        out.push_str(&format!("  signed series {}\n", fmt_vec(&h.signed)));
        match &h.outcome {
            Ok(result) => out.push_str(&format_fit_block(result)),
            Err(err) => out.push_str(&format!("  fit failed: {err}\n")),
        }
    }
    out.push_str("\nMagnitude data alone cannot tell which hypothesis holds; both are reported.\n");
    out
}

/// Per-sample residual table.
pub fn format_residual_table(rows: &[Residual]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>10} {:>12} {:>12} {:>12}\n", "t", "y_obs", "y_fit", "residual"));
    out.push_str(&format!("{:-<10} {:-<12} {:-<12} {:-<12}\n", "", "", "", ""));
    for r in rows {
        out.push_str(&format!(
            "{:>10.1} {:>12.4} {:>12.4} {:>12.4}\n",
            r.t, r.y_obs, r.y_fit, r.residual
        ));
    }
    out
}

/// Summary of a map run and the files written.
pub fn format_map_summary(map: &ParamMap, paths: &[PathBuf]) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== relax - {} map ===\n", map.model.display_name()));
    let names = map.model.param_names();
    let layout: Vec<String> = names
        .iter()
        .map(|n| n.to_string())
        .chain(names.iter().map(|n| format!("d{n}")))
        .collect();
    out.push_str(&format!("Layout (last axis): [{}]\n", layout.join(", ")));
    out.push_str(&format!("Skipped (below threshold): {}\n", map.skipped));
    for (layer, path) in map.layers.iter().zip(paths) {
        let label = layer
            .hypothesis
            .map(|h| format!("Hypothesis {}", h.label()))
            .unwrap_or_else(|| "Fit".to_string());
        out.push_str(&format!(
            "{label}: fitted={} failed={} -> {}\n",
            layer.fitted,
            layer.failed,
            path.display()
        ));
    }
    out
}

fn fmt_num(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.4}")
    } else {
        format!("{v}")
    }
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| fmt_num(*x)).collect();
    format!("[{}]", parts.join(", "))
}
