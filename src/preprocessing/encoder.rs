//! One-hot encoding of categorical columns

use crate::error::{AnalysisError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Categories observed for one source column, in sorted order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnCategories {
    pub column: String,
    pub categories: Vec<String>,
}

/// One-hot encoder producing `<column>_<category>` indicator columns.
///
/// Categories are the distinct text values of each column, sorted
/// numerically when every one parses as a number and as text otherwise. With
/// `drop_first` the first sorted category is the reference level and gets
/// no indicator, so a column with k categories yields k - 1 indicators.
/// Indicators are appended after the untouched columns in
/// column-then-category order and the source columns are removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    drop_first: bool,
    mappings: Vec<ColumnCategories>,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl OneHotEncoder {
    /// Create a new encoder
    pub fn new(drop_first: bool) -> Self {
        Self {
            drop_first,
            mappings: Vec::new(),
            is_fitted: false,
        }
    }

    /// Learn the categories of `columns`
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.mappings.clear();

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| AnalysisError::FeatureNotFound(col_name.to_string()))?;

            let categories: BTreeSet<String> = column_as_text(column)?
                .into_iter()
                .flatten()
                .collect();

            debug!(column = %col_name, n_categories = categories.len(), "Fitted categories");

            self.mappings.push(ColumnCategories {
                column: col_name.to_string(),
                categories: sort_categories(categories),
            });
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace each fitted column by its indicator columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(AnalysisError::ModelNotFitted);
        }

        let mut result = df.clone();

        for mapping in &self.mappings {
            let column = df
                .column(&mapping.column)
                .map_err(|_| AnalysisError::FeatureNotFound(mapping.column.clone()))?;
            let values = column_as_text(column)?;

            for category in self.encoded_categories(mapping) {
                let indicator: Vec<i32> = values
                    .iter()
                    .map(|v| if v.as_deref() == Some(category.as_str()) { 1 } else { 0 })
                    .collect();

                let name = indicator_name(&mapping.column, category);
                result.with_column(Column::new(name.into(), indicator))?;
            }

            result = result.drop(&mapping.column)?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fitted categories per column
    pub fn categories(&self) -> &[ColumnCategories] {
        &self.mappings
    }

    /// Names of the indicator columns `transform` appends
    pub fn output_columns(&self) -> Vec<String> {
        self.mappings
            .iter()
            .flat_map(|m| {
                self.encoded_categories(m)
                    .iter()
                    .map(move |c| indicator_name(&m.column, c))
            })
            .collect()
    }

    /// Dropped reference level for a column, if any
    pub fn reference_level(&self, column: &str) -> Option<&str> {
        if !self.drop_first {
            return None;
        }
        self.mappings
            .iter()
            .find(|m| m.column == column)
            .and_then(|m| m.categories.first())
            .map(|s| s.as_str())
    }

    fn encoded_categories<'a>(&self, mapping: &'a ColumnCategories) -> &'a [String] {
        if self.drop_first && !mapping.categories.is_empty() {
            &mapping.categories[1..]
        } else {
            &mapping.categories
        }
    }
}

fn sort_categories(categories: BTreeSet<String>) -> Vec<String> {
    let numeric: Option<Vec<f64>> = categories.iter().map(|c| c.trim().parse::<f64>().ok()).collect();
    match numeric {
        Some(values) => {
            let mut paired: Vec<(f64, String)> = values.into_iter().zip(categories).collect();
            paired.sort_by(|a, b| a.0.total_cmp(&b.0));
            paired.into_iter().map(|(_, c)| c).collect()
        }
        None => categories.into_iter().collect(),
    }
}

fn indicator_name(column: &str, category: &str) -> String {
    format!("{}_{}", column, category)
}

/// Read a column as text; non-text columns are cast so numeric categories
/// encode the same way as string ones. Nulls stay `None` and match no category.
pub(crate) fn column_as_text(column: &Column) -> Result<Vec<Option<String>>> {
    let cast;
    let series = if matches!(column.dtype(), DataType::String) {
        column.as_materialized_series()
    } else {
        cast = column.cast(&DataType::String)?;
        cast.as_materialized_series()
    };

    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df!(
            "kills" => &[10.0, 4.0, 7.0, 2.0],
            "map_type" => &["Hybrid", "Control", "Escort", "Control"]
        )
        .unwrap()
    }

    #[test]
    fn test_drop_first_yields_k_minus_one() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::new(true);
        let encoded = encoder.fit_transform(&df, &["map_type"]).unwrap();

        let names: Vec<String> = encoded
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["kills", "map_type_Escort", "map_type_Hybrid"]);
        assert_eq!(encoder.reference_level("map_type"), Some("Control"));
    }

    #[test]
    fn test_without_drop_first() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::new(false);
        let encoded = encoder.fit_transform(&df, &["map_type"]).unwrap();
        assert_eq!(encoded.width(), 4);
        assert_eq!(encoder.reference_level("map_type"), None);
    }

    #[test]
    fn test_indicator_values() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::default();
        let encoded = encoder.fit_transform(&df, &["map_type"]).unwrap();

        let hybrid: Vec<Option<i32>> = encoded
            .column("map_type_Hybrid")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(hybrid, vec![Some(1), Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn test_numeric_category_column() {
        let df = df!("season" => &[2019i64, 2020, 2019, 2021]).unwrap();
        let mut encoder = OneHotEncoder::default();
        let encoded = encoder.fit_transform(&df, &["season"]).unwrap();
        assert_eq!(encoder.output_columns(), vec!["season_2020", "season_2021"]);
        assert_eq!(encoded.width(), 2);
    }

    #[test]
    fn test_numeric_categories_sort_by_value() {
        let df = df!("round" => &[10i64, 2, 33, 2]).unwrap();
        let mut encoder = OneHotEncoder::default();
        encoder.fit_transform(&df, &["round"]).unwrap();

        assert_eq!(encoder.reference_level("round"), Some("2"));
        assert_eq!(encoder.output_columns(), vec!["round_10", "round_33"]);
    }

    #[test]
    fn test_mixed_categories_sort_as_text() {
        let df = df!("hero_name" => &["0", "Ana", "10", "2"]).unwrap();
        let mut encoder = OneHotEncoder::default();
        encoder.fit(&df, &["hero_name"]).unwrap();

        assert_eq!(encoder.categories()[0].categories, vec!["0", "10", "2", "Ana"]);
    }

    #[test]
    fn test_missing_column() {
        let df = sample_df();
        let mut encoder = OneHotEncoder::default();
        let result = encoder.fit(&df, &["hero_name"]);
        assert!(matches!(result, Err(AnalysisError::FeatureNotFound(c)) if c == "hero_name"));
    }

    #[test]
    fn test_transform_before_fit() {
        let encoder = OneHotEncoder::default();
        assert!(matches!(
            encoder.transform(&sample_df()),
            Err(AnalysisError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_single_category_produces_no_indicator() {
        let df = df!("map_type" => &["Control", "Control"]).unwrap();
        let mut encoder = OneHotEncoder::default();
        let encoded = encoder.fit_transform(&df, &["map_type"]).unwrap();
        assert_eq!(encoded.width(), 0);
    }
}
