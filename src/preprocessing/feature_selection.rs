//! Feature selection
//!
//! Keeps the features whose fitted-model importance is at or above a
//! threshold resolved from the importances themselves.

use crate::error::{AnalysisError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Threshold applied to importance scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImportanceThreshold {
    /// Mean of all importances
    Mean,
    /// Median of all importances
    Median,
    /// `factor` times the mean
    ScaledMean(f64),
    /// `factor` times the median
    ScaledMedian(f64),
    /// Fixed value
    Value(f64),
}

impl ImportanceThreshold {
    /// Resolve the threshold against a set of scores
    pub fn resolve(&self, scores: &[f64]) -> f64 {
        match *self {
            ImportanceThreshold::Mean => mean(scores),
            ImportanceThreshold::Median => median(scores),
            ImportanceThreshold::ScaledMean(factor) => factor * mean(scores),
            ImportanceThreshold::ScaledMedian(factor) => factor * median(scores),
            ImportanceThreshold::Value(v) => v,
        }
    }
}

/// Column selector shared by the training and test matrices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSelector {
    threshold: ImportanceThreshold,
    selected_features: Option<Vec<usize>>,
    feature_scores: Option<Vec<f64>>,
    feature_names: Option<Vec<String>>,
    threshold_value: Option<f64>,
    n_features_in: Option<usize>,
}

impl FeatureSelector {
    /// Create a selector keeping importances at or above `threshold`
    pub fn from_model(threshold: ImportanceThreshold) -> Self {
        Self {
            threshold,
            selected_features: None,
            feature_scores: None,
            feature_names: None,
            threshold_value: None,
            n_features_in: None,
        }
    }

    /// Set feature names
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// Fit from the importances of an already fitted model
    pub fn fit_importances(&mut self, importances: &[f64]) -> Result<()> {
        if importances.is_empty() {
            return Err(AnalysisError::ValidationError(
                "No importances to select from".to_string(),
            ));
        }
        self.check_names(importances.len())?;

        let cutoff = self.threshold.resolve(importances);
        let selected: Vec<usize> = importances
            .iter()
            .enumerate()
            .filter(|(_, &score)| score >= cutoff)
            .map(|(i, _)| i)
            .collect();

        self.n_features_in = Some(importances.len());
        self.threshold_value = Some(cutoff);
        self.feature_scores = Some(importances.to_vec());
        self.selected_features = Some(selected);
        Ok(())
    }

    /// Keep the selected columns of `x`, in original order
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let selected = self.selected_features.as_ref().ok_or(AnalysisError::ModelNotFitted)?;

        if let Some(n_in) = self.n_features_in {
            if x.ncols() != n_in {
                return Err(AnalysisError::ShapeError {
                    expected: format!("{} columns", n_in),
                    actual: format!("{} columns", x.ncols()),
                });
            }
        }

        if selected.is_empty() {
            return Err(AnalysisError::ValidationError(
                "No features selected".to_string(),
            ));
        }

        Ok(x.select(Axis(1), selected))
    }

    /// Get selected feature indices
    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected_features.as_deref()
    }

    /// Get feature scores
    pub fn scores(&self) -> Option<&[f64]> {
        self.feature_scores.as_deref()
    }

    /// Resolved threshold of the last fit
    pub fn threshold(&self) -> Option<f64> {
        self.threshold_value
    }

    /// Get selected feature names
    pub fn selected_names(&self) -> Option<Vec<String>> {
        let indices = self.selected_features.as_ref()?;
        let names = self.feature_names.as_ref()?;

        Some(
            indices
                .iter()
                .filter_map(|&i| names.get(i).cloned())
                .collect(),
        )
    }

    fn check_names(&self, n_features: usize) -> Result<()> {
        match &self.feature_names {
            Some(names) if names.len() != n_features => Err(AnalysisError::ShapeError {
                expected: format!("{} feature names", n_features),
                actual: format!("{} feature names", names.len()),
            }),
            _ => Ok(()),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mean_threshold() {
        let mut selector = FeatureSelector::from_model(ImportanceThreshold::Mean)
            .with_feature_names(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        selector.fit_importances(&[0.4, 0.1, 0.3, 0.2]).unwrap();

        assert!((selector.threshold().unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(selector.selected_indices(), Some(&[0usize, 2][..]));
        assert_eq!(selector.selected_names().unwrap(), vec!["a", "c"]);
        assert_eq!(selector.scores(), Some(&[0.4, 0.1, 0.3, 0.2][..]));
    }

    #[test]
    fn test_equal_importances_keep_all() {
        let mut selector = FeatureSelector::from_model(ImportanceThreshold::Mean);
        selector.fit_importances(&[0.25, 0.25, 0.25, 0.25]).unwrap();
        assert_eq!(selector.selected_indices().unwrap().len(), 4);
    }

    #[test]
    fn test_median_and_value_thresholds() {
        let scores = [0.5, 0.3, 0.1, 0.1];

        let mut median = FeatureSelector::from_model(ImportanceThreshold::Median);
        median.fit_importances(&scores).unwrap();
        assert_eq!(median.selected_indices(), Some(&[0usize, 1][..]));

        let mut fixed = FeatureSelector::from_model(ImportanceThreshold::Value(0.4));
        fixed.fit_importances(&scores).unwrap();
        assert_eq!(fixed.selected_indices(), Some(&[0usize][..]));

        let mut scaled = FeatureSelector::from_model(ImportanceThreshold::ScaledMean(0.5));
        scaled.fit_importances(&scores).unwrap();
        assert_eq!(scaled.selected_indices(), Some(&[0usize, 1][..]));
    }

    #[test]
    fn test_same_columns_for_train_and_test() {
        let mut selector = FeatureSelector::from_model(ImportanceThreshold::Mean);
        selector.fit_importances(&[0.05, 0.6, 0.05, 0.3]).unwrap();

        let train = array![[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]];
        let test = array![[9.0, 10.0, 11.0, 12.0]];

        let train_sel = selector.transform(&train).unwrap();
        let test_sel = selector.transform(&test).unwrap();

        assert_eq!(train_sel.ncols(), test_sel.ncols());
        assert_eq!(train_sel.row(0).to_vec(), vec![2.0, 4.0]);
        assert_eq!(test_sel.row(0).to_vec(), vec![10.0, 12.0]);
    }

    #[test]
    fn test_transform_width_mismatch() {
        let mut selector = FeatureSelector::from_model(ImportanceThreshold::Mean);
        selector.fit_importances(&[0.5, 0.5]).unwrap();
        let x = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            selector.transform(&x),
            Err(AnalysisError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_transform_before_fit() {
        let selector = FeatureSelector::from_model(ImportanceThreshold::Mean);
        assert!(matches!(
            selector.transform(&array![[1.0]]),
            Err(AnalysisError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_name_count_mismatch() {
        let mut selector = FeatureSelector::from_model(ImportanceThreshold::Mean)
            .with_feature_names(vec!["only".into()]);
        assert!(selector.fit_importances(&[0.5, 0.5]).is_err());
    }
}
