//! The `(row, column, time)` signal array.

use ndarray::{Array3, ArrayView2, Axis, s};

use crate::domain::{TimeBase, Voxel};
use crate::error::{AppError, FitError};

/// A loaded relaxometry dataset. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    data: Array3<f64>,
}

impl Dataset {
    pub fn new(data: Array3<f64>) -> Result<Self, AppError> {
        let (rows, cols, n_times) = data.dim();
        if rows == 0 || cols == 0 || n_times == 0 {
            return Err(AppError::new(
                3,
                format!("Dataset has an empty axis: shape ({rows}, {cols}, {n_times})."),
            ));
        }
        Ok(Self { data })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.dim().0
    }

    pub fn cols(&self) -> usize {
        self.data.dim().1
    }

    pub fn n_times(&self) -> usize {
        self.data.dim().2
    }

    pub fn as_array(&self) -> &Array3<f64> {
        &self.data
    }

    /// Absolute value of every sample ("magnitude data").
    pub fn magnitude(&self) -> Dataset {
        Dataset {
            data: self.data.mapv(f64::abs),
        }
    }

    /// The image at time index 0, used for point picking.
    pub fn first_slice(&self) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(2), 0)
    }

    /// Check the positional pairing between the time axis and a time base.
    pub fn check_time_base(&self, times: &TimeBase) -> Result<(), FitError> {
        if self.n_times() != times.len() {
            return Err(FitError::ShapeMismatch {
                what: "dataset time axis",
                expected: times.len(),
                got: self.n_times(),
            });
        }
        Ok(())
    }

    /// The time series of one voxel.
    pub fn series(&self, voxel: Voxel) -> Result<Vec<f64>, AppError> {
        let (rows, cols, _) = self.shape();
        if voxel.row >= rows || voxel.col >= cols {
            return Err(AppError::new(
                2,
                format!("Voxel {voxel} is outside the {rows}x{cols} image."),
            ));
        }
        Ok(self.data.slice(s![voxel.row, voxel.col, ..]).to_vec())
    }
}

/// Extract one voxel's samples along the time axis.
pub fn extract_series(dataset: &Dataset, voxel: Voxel) -> Result<Vec<f64>, AppError> {
    dataset.series(voxel)
}
