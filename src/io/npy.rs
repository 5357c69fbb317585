//! `.npy` datasets.
//!
//! Datasets are 3D arrays `(row, column, time)`. Accepted element types:
//! - `float64` as is
//! - `float32`, widened
//! - `complex64` / `complex128`, reduced to magnitude
//!
//! Parameter maps and phantoms are written back as `float64`.

use std::path::Path;

use ndarray::{ArrayD, Ix3};
use ndarray_npy::{ReadNpyError, ReadableElement, read_npy, write_npy};
use num_complex::{Complex32, Complex64};

use crate::data::Dataset;
use crate::error::AppError;

/// Load a dataset file.
pub fn load_dataset(path: &Path) -> Result<Dataset, AppError> {
    let raw = read_any(path)?;
    let ndim = raw.ndim();
    let data = raw.into_dimensionality::<Ix3>().map_err(|_| {
        AppError::new(
            3,
            format!(
                "Dataset '{}' has {ndim} axes, expected 3 (row, column, time).",
                path.display()
            ),
        )
    })?;
    let dataset = Dataset::new(data)?;
    tracing::info!(path = %path.display(), shape = ?dataset.shape(), "loaded dataset");
    Ok(dataset)
}

fn read_any(path: &Path) -> Result<ArrayD<f64>, AppError> {
    if let Some(a) = try_read::<f64>(path)? {
        return Ok(a);
    }
    if let Some(a) = try_read::<f32>(path)? {
        tracing::debug!("widening float32 dataset");
        return Ok(a.mapv(f64::from));
    }
    if let Some(a) = try_read::<Complex64>(path)? {
        tracing::info!("complex dataset reduced to magnitude");
        return Ok(a.mapv(|z| z.norm()));
    }
    if let Some(a) = try_read::<Complex32>(path)? {
        tracing::info!("complex dataset reduced to magnitude");
        return Ok(a.mapv(|z| f64::from(z.norm())));
    }
    Err(AppError::new(
        2,
        format!(
            "Unsupported element type in '{}' (expected float32/float64/complex).",
            path.display()
        ),
    ))
}

/// `Ok(None)` when the file holds a different element type.
fn try_read<T: ReadableElement>(path: &Path) -> Result<Option<ArrayD<T>>, AppError> {
    match read_npy::<_, ArrayD<T>>(path) {
        Ok(a) => Ok(Some(a)),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(AppError::new(
            2,
            format!("Failed to read '{}': {e}", path.display()),
        )),
    }
}

/// Write a dataset (e.g. a synthetic phantom).
pub fn save_dataset(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    write_npy(path, dataset.as_array())
        .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))
}

/// Write any float64 array.
pub fn save_array<D: ndarray::Dimension>(
    path: &Path,
    array: &ndarray::Array<f64, D>,
) -> Result<(), AppError> {
    write_npy(path, array)
        .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Voxel;
    use ndarray::{Array2, Array3};
    use num_complex::Complex64;
    use tempfile::tempdir;

    #[test]
    fn dataset_round_trips_through_npy() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t2.npy");
        let data = Array3::from_shape_fn((2, 3, 4), |(r, c, t)| (r * 12 + c * 4 + t) as f64 * 0.5);
        let ds = Dataset::new(data).unwrap();
        save_dataset(&path, &ds).unwrap();
        let back = load_dataset(&path).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn float32_is_widened() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f32.npy");
        let data = Array3::<f32>::from_elem((1, 1, 3), 1.5);
        write_npy(&path, &data).unwrap();
        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.series(Voxel::new(0, 0)).unwrap(), vec![1.5, 1.5, 1.5]);
    }

    #[test]
    fn complex_is_reduced_to_magnitude() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.npy");
        let data = Array3::from_elem((1, 1, 2), Complex64::new(3.0, -4.0));
        write_npy(&path, &data).unwrap();
        let ds = load_dataset(&path).unwrap();
        assert_eq!(ds.series(Voxel::new(0, 0)).unwrap(), vec![5.0, 5.0]);
    }

    #[test]
    fn wrong_rank_is_a_shape_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("img.npy");
        write_npy(&path, &Array2::<f64>::zeros((4, 4))).unwrap();
        assert_eq!(load_dataset(&path).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_dataset(Path::new("/nonexistent/t1dataset.npy")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
