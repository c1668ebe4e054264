//! Conversion of an encoded table into a feature matrix and class labels

use super::encoder::column_as_text;
use super::is_numeric_dtype;
use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maps label text to class indices `0..n_classes`.
///
/// Classes are sorted numerically when every label parses as a number,
/// lexicographically otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the classes present in `labels`
    pub fn fit(labels: &[String]) -> Self {
        let unique: BTreeSet<&String> = labels.iter().collect();
        let mut classes: Vec<String> = unique.into_iter().cloned().collect();

        let numeric: Option<Vec<f64>> = classes.iter().map(|c| c.trim().parse::<f64>().ok()).collect();
        if let Some(values) = numeric {
            let mut paired: Vec<(f64, String)> = values.into_iter().zip(classes).collect();
            paired.sort_by(|a, b| a.0.total_cmp(&b.0));
            classes = paired.into_iter().map(|(_, c)| c).collect();
        }

        Self { classes }
    }

    /// Encode labels as class indices
    pub fn transform(&self, labels: &[String]) -> Result<Array1<f64>> {
        labels
            .iter()
            .map(|label| {
                self.index_of(label).map(|i| i as f64).ok_or_else(|| {
                    AnalysisError::ValidationError(format!("Unknown label: {}", label))
                })
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Label text of a class index
    pub fn class_name(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(|s| s.as_str())
    }

    /// All class names in index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    fn index_of(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }
}

/// Feature matrix, encoded labels and the names that go with them
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
    pub labels: LabelEncoder,
}

impl PreparedData {
    /// Split `df` into the label column and every other column as features.
    ///
    /// Feature columns must be numeric or boolean; a leftover text column is
    /// reported by name.
    pub fn from_frame(df: &DataFrame, target: &str) -> Result<Self> {
        if df.height() == 0 {
            return Err(AnalysisError::DataError("Dataset has no rows".to_string()));
        }

        let target_column = df
            .column(target)
            .map_err(|_| AnalysisError::FeatureNotFound(target.to_string()))?;

        let label_text: Vec<String> = column_as_text(target_column)?
            .into_iter()
            .map(|v| v.unwrap_or_default())
            .collect();
        let labels = LabelEncoder::fit(&label_text);
        let y = labels.transform(&label_text)?;

        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target)
            .map(|s| s.to_string())
            .collect();

        if feature_names.is_empty() {
            return Err(AnalysisError::DataError("No feature columns left".to_string()));
        }

        let x = columns_to_array2(df, &feature_names)?;

        Ok(Self {
            x,
            y,
            feature_names,
            labels,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Extract named columns into a row-major `Array2<f64>`
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| AnalysisError::FeatureNotFound(col_name.clone()))?;

            let dtype = column.dtype();
            if !(is_numeric_dtype(dtype) || matches!(dtype, DataType::Boolean)) {
                return Err(AnalysisError::DataError(format!(
                    "Column '{}' is not numeric ({})",
                    col_name, dtype
                )));
            }

            let cast = column.cast(&DataType::Float64)?;
            let values: Vec<f64> = cast
                .as_materialized_series()
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}
