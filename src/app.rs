//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments into run configs
//! - runs the fit pipeline through the chosen picker and viewer
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, MapArgs, PlotArgs, SimulateArgs, VoxelArgs};
use crate::domain::{Hypothesis, PickerKind, Relaxation, RunConfig, ViewerKind, Voxel};
use crate::error::AppError;
use crate::interact::{AsciiViewer, FitViewer, FixedVoxel, NoViewer, PromptPicker, VoxelPicker};
use crate::io::hypothesis_path;

pub mod pipeline;

use pipeline::{RunOutput, VoxelFit};

/// Entry point for the `relax` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::T1(args) => handle_voxel(Relaxation::T1, &args),
        Command::T2(args) => handle_voxel(Relaxation::T2, &args),
        Command::Map(args) => handle_map(&args),
        Command::Simulate(args) => handle_simulate(&args),
        Command::Plot(args) => handle_plot(&args),
    }
}

/// Picker for a run: an explicit voxel wins over interactive picking.
pub fn make_picker(kind: PickerKind, voxel: Option<Voxel>) -> Box<dyn VoxelPicker> {
    match (voxel, kind) {
        (Some(v), _) => Box::new(FixedVoxel(v)),
        (None, PickerKind::Tui) => Box::new(crate::tui::TuiPicker),
        (None, PickerKind::Prompt) => Box::new(PromptPicker),
    }
}

pub fn make_viewer(kind: ViewerKind, width: usize, height: usize) -> Box<dyn FitViewer> {
    match kind {
        ViewerKind::Tui => Box::new(crate::tui::TuiViewer),
        ViewerKind::Ascii => Box::new(AsciiViewer::stdout(width, height)),
        ViewerKind::None => Box::new(NoViewer),
    }
}

fn handle_voxel(relaxation: Relaxation, args: &VoxelArgs) -> Result<(), AppError> {
    let config = crate::cli::run_config(relaxation, args)?;
    let dataset = pipeline::load_dataset(&config.data, &config.times)?;

    let voxel = make_picker(config.picker, config.voxel).pick(&dataset, &config.times)?;
    tracing::info!(%voxel, model = %config.model, "fitting voxel");

    let run = pipeline::fit_voxel(&config, &dataset, voxel)?;

    // The viewer may take over the terminal; it runs before anything is printed.
    make_viewer(config.viewer, config.plot_width, config.plot_height).show(&run.view())?;

    print_run(&run)?;
    write_exports(&config, &run)?;

    if run.all_failed() {
        return Err(AppError::new(4, "Both polarity hypotheses failed to fit."));
    }
    Ok(())
}

fn print_run(run: &RunOutput) -> Result<(), AppError> {
    match &run.result {
        VoxelFit::Decay { series, fit } => {
            println!("{}", crate::report::format_fit_summary(fit, run.voxel));
            let rows = crate::report::compute_residuals(&run.times, series, fit)?;
            println!("{}", crate::report::format_residual_table(&rows));
        }
        VoxelFit::InversionRecovery { fit, .. } => {
            println!("{}", crate::report::format_t1_summary(fit, &run.times, run.voxel));
        }
    }
    Ok(())
}

fn write_exports(config: &RunConfig, run: &RunOutput) -> Result<(), AppError> {
    if config.export_fit.is_none() && config.export_csv.is_none() {
        return Ok(());
    }

    let fits: Vec<(Option<Hypothesis>, &[f64], &crate::domain::FitResult)> = match &run.result {
        VoxelFit::Decay { series, fit } => vec![(None, series.as_slice(), fit)],
        VoxelFit::InversionRecovery { fit, .. } => fit
            .hypotheses()
            .into_iter()
            .filter_map(|h| {
                h.outcome
                    .as_ref()
                    .ok()
                    .map(|r| (Some(h.hypothesis), h.signed.as_slice(), r))
            })
            .collect(),
    };

    for (hypothesis, series, fit) in fits {
        if let Some(path) = &config.export_fit {
            let path = hypothesis_path(path, hypothesis);
            let file = crate::io::build_fit_file(fit, &run.times, series, Some(run.voxel), hypothesis);
            crate::io::write_fit_json(&path, &file)?;
            tracing::info!(path = %path.display(), "wrote fit JSON");
        }
        if let Some(path) = &config.export_csv {
            let path = hypothesis_path(path, hypothesis);
            let rows = crate::report::compute_residuals(&run.times, series, fit)?;
            crate::io::write_residuals_csv(&path, &rows)?;
            tracing::info!(path = %path.display(), "wrote residual CSV");
        }
    }
    Ok(())
}

fn handle_map(args: &MapArgs) -> Result<(), AppError> {
    let config = crate::cli::map_config(args)?;
    let dataset = pipeline::load_dataset(&config.data, &config.times)?;

    let map = crate::fit::fit_map(
        &dataset,
        config.model,
        &config.times,
        &config.guess,
        config.threshold,
        &crate::math::LmOptions::default(),
    )?;

    let mut paths = Vec::with_capacity(map.layers.len());
    for layer in &map.layers {
        let path = hypothesis_path(&config.out, layer.hypothesis);
        crate::io::save_array(&path, &layer.values)?;
        paths.push(path);
    }

    println!("{}", crate::report::format_map_summary(&map, &paths));
    Ok(())
}

fn handle_simulate(args: &SimulateArgs) -> Result<(), AppError> {
    let config = crate::cli::phantom_config(args);
    let phantom = crate::data::generate_phantom(&config)?;
    crate::io::save_dataset(&config.out, &phantom.dataset)?;

    let (rows, cols, n) = phantom.dataset.shape();
    println!(
        "Wrote {} phantom ({rows}x{cols}x{n}, noise sd {}, seed {}) to {}",
        config.relaxation.label(),
        config.noise,
        config.seed,
        config.out.display()
    );
    Ok(())
}

fn handle_plot(args: &PlotArgs) -> Result<(), AppError> {
    let file = crate::io::read_fit_json(&args.fit)?;

    let mut header = file.display_name.clone();
    if let Some(h) = file.hypothesis {
        header.push_str(&format!(" | hypothesis {}", h.label()));
    }
    if let Some(v) = file.voxel {
        header.push_str(&format!(" | voxel {v}"));
    }
    println!("{header}");
    println!("{}", crate::plot::render_fit_file_plot(&file, args.width, args.height));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Guess;
    use crate::io::{load_dataset, read_fit_json, save_dataset};
    use tempfile::tempdir;

    #[test]
    fn explicit_voxel_skips_interactive_picker() {
        let ds = crate::data::Dataset::new(ndarray::Array3::zeros((2, 2, 2))).unwrap();
        let tb = crate::domain::TimeBase::new(vec![1.0, 2.0]).unwrap();
        let v = make_picker(PickerKind::Tui, Some(Voxel::new(1, 0)))
            .pick(&ds, &tb)
            .unwrap();
        assert_eq!(v, Voxel::new(1, 0));
    }

    #[test]
    fn t1_exports_one_file_per_hypothesis() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("t1.npy");
        let phantom = crate::data::generate_phantom(&crate::domain::PhantomConfig {
            relaxation: Relaxation::T1,
            out: data.clone(),
            rows: 16,
            cols: 16,
            times: Relaxation::T1.default_times(),
            noise: 0.0,
            seed: 3,
        })
        .unwrap();
        save_dataset(&data, &phantom.dataset).unwrap();

        let config = RunConfig {
            data: data.clone(),
            model: Relaxation::T1.default_model(),
            times: Relaxation::T1.default_times(),
            guess: Guess::Fixed(vec![100.0, 1000.0]),
            voxel: Some(Voxel::new(5, 5)),
            picker: PickerKind::Prompt,
            viewer: ViewerKind::None,
            plot_width: 60,
            plot_height: 15,
            export_fit: Some(dir.path().join("fit.json")),
            export_csv: Some(dir.path().join("res.csv")),
        };
        let ds = load_dataset(&data).unwrap();
        let run = pipeline::fit_voxel(&config, &ds, Voxel::new(5, 5)).unwrap();
        write_exports(&config, &run).unwrap();

        let written: Vec<bool> = ["fit_A.json", "fit_B.json", "res_A.csv", "res_B.csv"]
            .iter()
            .map(|f| dir.path().join(f).exists())
            .collect();
        // T1 = 600 crosses zero before t=500, so hypothesis A is the right unfolding.
        assert!(written[0] && written[2]);
        let a = read_fit_json(&dir.path().join("fit_A.json")).unwrap();
        assert_eq!(a.hypothesis, Some(Hypothesis::A));
        assert_eq!(a.voxel, Some(Voxel::new(5, 5)));
        assert!((a.params[1] - 600.0).abs() < 1.0);
    }
}
