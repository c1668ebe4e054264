//! Model training module
//!
//! Provides the classifiers compared by the analysis:
//! - Decision trees and Random Forests
//! - Gradient boosting (binary and multiclass)
//! - Multinomial logistic regression
//! - Classification reports

pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod metrics;
pub mod random_forest;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::LogisticRegression;
pub use metrics::{AverageMetrics, ClassMetrics, ClassificationReport};
pub use random_forest::{MaxFeatures, RandomForest};

use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2, ArrayViewMut1};

/// Common interface for classifiers trained on class-index targets
pub trait Classifier: Send + Sync {
    /// Display name used in reports
    fn name(&self) -> &'static str;

    /// Fit the model
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict class indices
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Feature importances, if the model provides them
    fn feature_importances(&self) -> Option<&Array1<f64>> {
        None
    }
}

/// Number of classes implied by class-index targets (max index + 1)
pub(crate) fn n_classes_of(y: &Array1<f64>) -> Result<usize> {
    let mut max_class = 0usize;
    for &v in y.iter() {
        if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
            return Err(AnalysisError::TrainingError(format!(
                "Targets must be non-negative class indices, found {}",
                v
            )));
        }
        max_class = max_class.max(v as usize);
    }
    Ok(max_class + 1)
}

/// Index of the largest value; the first one wins ties
pub(crate) fn argmax(values: impl IntoIterator<Item = f64>) -> usize {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, v) in values.into_iter().enumerate() {
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    best_idx
}

/// Numerically stable softmax over one row
pub(crate) fn softmax_in_place(row: &mut ArrayViewMut1<f64>) {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    if sum > 0.0 {
        *row /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_n_classes_of() {
        assert_eq!(n_classes_of(&array![0.0, 2.0, 1.0]).unwrap(), 3);
        assert!(n_classes_of(&array![0.0, -1.0]).is_err());
        assert!(n_classes_of(&array![0.5]).is_err());
    }

    #[test]
    fn test_argmax_ties() {
        assert_eq!(argmax([0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax([1.0]), 0);
    }

    #[test]
    fn test_softmax() {
        let mut row = array![1.0, 1.0, 1000.0];
        softmax_in_place(&mut row.view_mut());
        assert!((row.sum() - 1.0).abs() < 1e-12);
        assert!(row[2] > 0.999);
    }

    #[test]
    fn test_trait_objects() {
        let models: Vec<Box<dyn Classifier>> = vec![
            Box::new(LogisticRegression::new()),
            Box::new(RandomForest::new(5)),
            Box::new(GradientBoostingClassifier::default()),
        ];
        let names: Vec<&str> = models.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["Logistic Regression", "Random Forest", "Gradient Boosting"]);
        assert!(models.iter().all(|m| m.feature_importances().is_none()));
    }
}
