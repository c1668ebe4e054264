//! Missing value imputation

use super::is_numeric_dtype;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fills every missing cell with one constant.
///
/// Numeric columns receive the value itself. Text columns receive its
/// textual form, so a missing categorical cell becomes an ordinary category
/// (`0.0` is written as `"0"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantImputer {
    fill_value: f64,
}

impl Default for ConstantImputer {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl ConstantImputer {
    /// Create a new imputer with the given fill value
    pub fn new(fill_value: f64) -> Self {
        Self { fill_value }
    }

    /// Numeric fill value
    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    /// Text written into missing cells of text columns
    pub fn fill_text(&self) -> String {
        if self.fill_value.is_finite() && self.fill_value.fract() == 0.0 {
            format!("{}", self.fill_value as i64)
        } else {
            self.fill_value.to_string()
        }
    }

    /// Return a copy of `df` with no null cells
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut filled_cells = 0usize;
        let columns = df
            .get_columns()
            .iter()
            .map(|col| {
                filled_cells += col.null_count();
                self.fill_column(col)
            })
            .collect::<Result<Vec<Column>>>()?;

        debug!(filled_cells, "Imputed missing values");
        Ok(DataFrame::new(columns)?)
    }

    fn fill_column(&self, col: &Column) -> Result<Column> {
        if col.null_count() == 0 {
            return Ok(col.clone());
        }

        let name = col.name().clone();
        match col.dtype() {
            DataType::Boolean => {
                let fill = self.fill_value != 0.0;
                let values: Vec<bool> = col
                    .as_materialized_series()
                    .bool()?
                    .into_iter()
                    .map(|v| v.unwrap_or(fill))
                    .collect();
                Ok(Column::new(name, values))
            }
            dtype if is_numeric_dtype(dtype) => {
                let cast = col.cast(&DataType::Float64)?;
                let values: Vec<f64> = cast
                    .as_materialized_series()
                    .f64()?
                    .into_iter()
                    .map(|v| v.unwrap_or(self.fill_value))
                    .collect();
                Ok(Column::new(name, values))
            }
            _ => {
                let fill = self.fill_text();
                let cast = col.cast(&DataType::String)?;
                let values: Vec<String> = cast
                    .as_materialized_series()
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string).unwrap_or_else(|| fill.clone()))
                    .collect();
                Ok(Column::new(name, values))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_numeric_and_text() {
        let df = df!(
            "kills" => &[Some(3.0), None, Some(5.0)],
            "map_type" => &[Some("Control"), None, Some("Hybrid")]
        )
        .unwrap();

        let filled = ConstantImputer::new(0.0).transform(&df).unwrap();

        let kills: Vec<Option<f64>> = filled
            .column("kills")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(kills, vec![Some(3.0), Some(0.0), Some(5.0)]);

        let maps: Vec<Option<&str>> = filled
            .column("map_type")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(maps, vec![Some("Control"), Some("0"), Some("Hybrid")]);
    }

    #[test]
    fn test_no_nulls_remain() {
        let df = df!(
            "a" => &[None, Some(1i64), None],
            "b" => &[Some(true), None, Some(false)],
            "c" => &[None::<&str>, None, Some("x")]
        )
        .unwrap();

        let filled = ConstantImputer::default().transform(&df).unwrap();
        for col in filled.get_columns() {
            assert_eq!(col.null_count(), 0, "column {} still has nulls", col.name());
        }
    }

    #[test]
    fn test_fill_text_formatting() {
        assert_eq!(ConstantImputer::new(0.0).fill_text(), "0");
        assert_eq!(ConstantImputer::new(-2.0).fill_text(), "-2");
        assert_eq!(ConstantImputer::new(1.5).fill_text(), "1.5");
    }

    #[test]
    fn test_untouched_column_keeps_dtype() {
        let df = df!("n" => &[1i64, 2, 3]).unwrap();
        let filled = ConstantImputer::default().transform(&df).unwrap();
        assert_eq!(filled.column("n").unwrap().dtype(), &DataType::Int64);
    }
}
