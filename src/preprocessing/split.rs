//! Seeded train/test split

use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Rows of a train/test partition
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Number of test rows for `n_samples` rows: `ceil(test_size * n_samples)`
pub fn test_rows(n_samples: usize, test_size: f64) -> usize {
    (test_size * n_samples as f64).ceil() as usize
}

/// Shuffle rows with a seeded RNG and hold out `test_size` of them.
///
/// The first `ceil(test_size * n)` permuted rows form the test set.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    random_state: u64,
) -> Result<TrainTestSplit> {
    let n_samples = x.nrows();

    if n_samples != y.len() {
        return Err(AnalysisError::ShapeError {
            expected: format!("y length = {}", n_samples),
            actual: format!("y length = {}", y.len()),
        });
    }

    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AnalysisError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n_test = test_rows(n_samples, test_size);
    if n_test == 0 || n_test >= n_samples {
        return Err(AnalysisError::ValidationError(format!(
            "With {} samples and test_size {}, one of the partitions would be empty",
            n_samples, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(random_state);
    indices.shuffle(&mut rng);

    let test_indices = indices[..n_test].to_vec();
    let train_indices = indices[n_test..].to_vec();

    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: y.select(Axis(0), &train_indices),
        y_test: y.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}
