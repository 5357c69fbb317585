//! Read/write fit JSON files.
//!
//! A fit file is the portable record of one fit:
//! - model kind, parameters, standard errors and covariance
//! - the fitted series with its time base and voxel
//! - a precomputed fitted grid for quick plotting
//!
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{FitFile, FitGrid, FitResult, Hypothesis, TimeBase, Voxel};
use crate::error::AppError;

/// Points on the fitted grid.
pub const GRID_POINTS: usize = 101;

/// Assemble the JSON record of a fit.
pub fn build_fit_file(
    fit: &FitResult,
    times: &TimeBase,
    series: &[f64],
    voxel: Option<Voxel>,
    hypothesis: Option<Hypothesis>,
) -> FitFile {
    FitFile {
        tool: "relax".to_string(),
        generated: Utc::now(),
        model: fit.model,
        display_name: fit.model.display_name().to_string(),
        hypothesis,
        voxel,
        times: times.clone(),
        series: series.to_vec(),
        param_names: fit.model.param_names().iter().map(|s| s.to_string()).collect(),
        params: fit.params.clone(),
        std_errors: fit.std_errors.clone(),
        covariance: fit.covariance_rows(),
        quality: fit.quality.clone(),
        grid: build_grid(fit, times.first(), times.last(), GRID_POINTS),
    }
}

/// Write a fit JSON file.
pub fn write_fit_json(path: &Path, fit_file: &FitFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, fit_file)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a fit JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit_file: FitFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))?;
    if fit_file.series.len() != fit_file.times.len() {
        return Err(AppError::new(
            3,
            format!(
                "Fit JSON has {} samples for {} acquisition times.",
                fit_file.series.len(),
                fit_file.times.len()
            ),
        ));
    }
    Ok(fit_file)
}

/// Sample the fitted curve evenly on `[t0, t1]`.
pub fn build_grid(fit: &FitResult, t0: f64, t1: f64, n: usize) -> FitGrid {
    let n = n.max(2);
    let (t0, t1) = if t0.is_finite() && t1.is_finite() && t1 > t0 {
        (t0, t1)
    } else {
        (0.0, 1.0)
    };

    let mut t = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for i in 0..n {
        let u = i as f64 / (n as f64 - 1.0);
        let ti = t0 + u * (t1 - t0);
        t.push(ti);
        y.push(fit.predict(ti));
    }
    FitGrid { t, y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelKind, Relaxation};
    use crate::fit::fit_model;
    use crate::math::LmOptions;
    use tempfile::tempdir;

    fn t2_fit() -> (FitResult, TimeBase, Vec<f64>) {
        let te = Relaxation::T2.default_times();
        let y: Vec<f64> = te
            .as_slice()
            .iter()
            .map(|&t| 100.0 * (-t / 70.0_f64).exp() + if t > 40.0 { 0.5 } else { -0.5 })
            .collect();
        let fit = fit_model(ModelKind::T2Exp, &te, &y, &[100.0, 100.0], &LmOptions::default()).unwrap();
        (fit, te, y)
    }

    #[test]
    fn grid_spans_the_time_base() {
        let (fit, te, y) = t2_fit();
        let file = build_fit_file(&fit, &te, &y, Some(Voxel::new(3, 4)), None);
        assert_eq!(file.grid.t.len(), GRID_POINTS);
        assert_eq!(file.grid.t[0], 10.0);
        assert_eq!(file.grid.t[GRID_POINTS - 1], 250.0);
        assert!((file.grid.y[0] - fit.predict(10.0)).abs() < 1e-9);
        assert_eq!(file.param_names, vec!["m0", "T2"]);
    }

    #[test]
    fn saved_plot_matches_live_plot_range() {
        let (fit, te, y) = t2_fit();
        let file = build_fit_file(&fit, &te, &y, None, None);
        let saved = crate::plot::render_fit_file_plot(&file, 40, 10);
        let live = crate::plot::render_fit_plot(&te, &y, &fit, 40, 10);
        assert!(saved.starts_with("Plot: t=[10.0, 250.0]"), "{saved}");
        assert!(live.starts_with("Plot: t=[10.0, 250.0]"), "{live}");
    }

    #[test]
    fn fit_json_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fit.json");
        let (fit, te, y) = t2_fit();
        let file = build_fit_file(&fit, &te, &y, Some(Voxel::new(1, 2)), None);
        write_fit_json(&path, &file).unwrap();

        let back = read_fit_json(&path).unwrap();
        assert_eq!(back.model, ModelKind::T2Exp);
        assert_eq!(back.voxel, Some(Voxel::new(1, 2)));
        assert_eq!(back.times, te);
        assert_eq!(back.params, file.params);
        assert_eq!(back.covariance.len(), 2);
    }

    #[test]
    fn infinite_errors_survive_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exact.json");
        let te = TimeBase::new(vec![10.0, 40.0]).unwrap();
        let y = [80.0, 50.0];
        let fit = fit_model(ModelKind::T2Exp, &te, &y, &[90.0, 60.0], &LmOptions::default()).unwrap();
        write_fit_json(&path, &build_fit_file(&fit, &te, &y, None, None)).unwrap();

        let back = read_fit_json(&path).unwrap();
        assert!(back.std_errors.iter().all(|v| v.is_infinite()));
        assert!(back.covariance[0][0].is_infinite());
    }

    #[test]
    fn unreadable_json_is_an_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(read_fit_json(&path).unwrap_err().exit_code(), 2);
    }
}
