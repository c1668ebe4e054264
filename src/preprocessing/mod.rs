//! Data preprocessing module
//!
//! Provides the preparation steps that run before model fitting:
//! - Constant imputation of missing cells
//! - One-hot encoding with a dropped reference level
//! - Identifier column removal and feature matrix extraction
//! - Seeded train/test split
//! - Importance- and variance-based feature selection

mod config;
mod dataset;
mod encoder;
mod imputer;
mod pipeline;
pub mod feature_selection;
pub mod split;

pub use config::PreprocessingConfig;
pub use dataset::{columns_to_array2, LabelEncoder, PreparedData};
pub use encoder::{ColumnCategories, OneHotEncoder};
pub use feature_selection::{FeatureSelector, ImportanceThreshold};
pub use imputer::ConstantImputer;
pub use pipeline::DataPreprocessor;
pub use split::{test_rows, train_test_split, TrainTestSplit};

use polars::prelude::DataType;

/// Integer and floating point column types
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
