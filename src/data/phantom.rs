//! Synthetic relaxometry phantom.
//!
//! A zero background with a few discs of tissue-like `(m0, T)` values, sampled
//! on a time base and corrupted with seeded Gaussian noise. T1 phantoms hold the
//! signed inversion-recovery signal (the real part an ideal phase-corrected
//! acquisition would give); fold it with `Dataset::magnitude` to get magnitude
//! data.

use ndarray::Array3;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::Dataset;
use crate::domain::{PhantomConfig, Relaxation};
use crate::error::AppError;
use crate::models::predict;

/// A disc in normalized image coordinates (`0..1` on both axes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disc {
    pub center: (f64, f64),
    pub radius: f64,
    pub m0: f64,
    pub relaxation_time: f64,
}

/// Tissue-like discs for each relaxation kind.
pub fn default_discs(relaxation: Relaxation) -> [Disc; 3] {
    let times = match relaxation {
        Relaxation::T1 => [600.0, 1000.0, 1600.0],
        Relaxation::T2 => [40.0, 80.0, 150.0],
    };
    [
        Disc {
            center: (0.3, 0.3),
            radius: 0.18,
            m0: 100.0,
            relaxation_time: times[0],
        },
        Disc {
            center: (0.3, 0.7),
            radius: 0.18,
            m0: 120.0,
            relaxation_time: times[1],
        },
        Disc {
            center: (0.72, 0.5),
            radius: 0.2,
            m0: 80.0,
            relaxation_time: times[2],
        },
    ]
}

#[derive(Debug, Clone)]
pub struct Phantom {
    pub dataset: Dataset,
    /// `(rows, cols, 2)`: the `m0` and relaxation time of each voxel; NaN in the background.
    pub truth: Array3<f64>,
}

pub fn generate_phantom(config: &PhantomConfig) -> Result<Phantom, AppError> {
    if config.rows == 0 || config.cols == 0 {
        return Err(AppError::new(2, "Phantom needs at least one row and one column."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::new(2, "Noise level must be finite and >= 0."));
    }

    let model = config.relaxation.default_model();
    let discs = default_discs(config.relaxation);
    let times = config.times.as_slice();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;

    let mut data = Array3::<f64>::zeros((config.rows, config.cols, times.len()));
    let mut truth = Array3::<f64>::from_elem((config.rows, config.cols, 2), f64::NAN);

    for r in 0..config.rows {
        for c in 0..config.cols {
            let y = (r as f64 + 0.5) / config.rows as f64;
            let x = (c as f64 + 0.5) / config.cols as f64;
            // Later discs win where they overlap.
            let disc = discs.iter().rev().find(|d| {
                let (cy, cx) = d.center;
                (y - cy).powi(2) + (x - cx).powi(2) <= d.radius * d.radius
            });
            if let Some(d) = disc {
                truth[[r, c, 0]] = d.m0;
                truth[[r, c, 1]] = d.relaxation_time;
                for (k, &t) in times.iter().enumerate() {
                    data[[r, c, k]] = predict(model, t, &[d.m0, d.relaxation_time]);
                }
            }
            if config.noise > 0.0 {
                for k in 0..times.len() {
                    data[[r, c, k]] += normal.sample(&mut rng);
                }
            }
        }
    }

    tracing::info!(
        relaxation = config.relaxation.label(),
        rows = config.rows,
        cols = config.cols,
        seed = config.seed,
        "generated phantom"
    );

    Ok(Phantom {
        dataset: Dataset::new(data)?,
        truth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Voxel;

    fn config(relaxation: Relaxation, noise: f64, seed: u64) -> PhantomConfig {
        PhantomConfig {
            relaxation,
            out: "phantom.npy".into(),
            rows: 20,
            cols: 20,
            times: relaxation.default_times(),
            noise,
            seed,
        }
    }

    #[test]
    fn same_seed_same_phantom() {
        let a = generate_phantom(&config(Relaxation::T2, 1.0, 7)).unwrap();
        let b = generate_phantom(&config(Relaxation::T2, 1.0, 7)).unwrap();
        let c = generate_phantom(&config(Relaxation::T2, 1.0, 8)).unwrap();
        assert_eq!(a.dataset, b.dataset);
        assert_ne!(a.dataset, c.dataset);
    }

    #[test]
    fn noiseless_t1_disc_holds_signed_recovery() {
        let p = generate_phantom(&config(Relaxation::T1, 0.0, 1)).unwrap();
        // (6, 6) sits at the centre of the first disc.
        let s = p.dataset.series(Voxel::new(6, 6)).unwrap();
        assert_eq!(p.truth[[6, 6, 1]], 600.0);
        assert!(s[0] < 0.0);
        assert!(s[s.len() - 1] > 0.0);
        let expected = predict(Relaxation::T1.default_model(), 50.0, &[100.0, 600.0]);
        assert!((s[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn background_is_zero_without_noise() {
        let p = generate_phantom(&config(Relaxation::T2, 0.0, 1)).unwrap();
        assert!(p.dataset.series(Voxel::new(0, 0)).unwrap().iter().all(|&v| v == 0.0));
        assert!(p.truth[[0, 0, 0]].is_nan());
    }

    #[test]
    fn negative_noise_is_rejected() {
        assert_eq!(
            generate_phantom(&config(Relaxation::T2, -1.0, 1))
                .unwrap_err()
                .exit_code(),
            2
        );
    }
}
