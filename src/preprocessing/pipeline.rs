//! Data preparation pipeline: impute, encode, drop, extract

use super::{
    config::PreprocessingConfig,
    dataset::PreparedData,
    encoder::OneHotEncoder,
    imputer::ConstantImputer,
};
use crate::error::{AnalysisError, Result};
use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Turns the raw match table into a feature matrix and labels
#[derive(Debug, Clone)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
    imputer: ConstantImputer,
    encoder: OneHotEncoder,
    fit_time: Option<f64>,
}

impl Default for DataPreprocessor {
    fn default() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }
}

impl DataPreprocessor {
    /// Create a preprocessor from a configuration
    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            imputer: ConstantImputer::new(config.fill_value),
            encoder: OneHotEncoder::new(config.drop_first),
            config,
            fit_time: None,
        }
    }

    /// Impute, one-hot encode and drop identifier columns.
    ///
    /// Categories are learned from the whole table, before any split.
    pub fn encode(&mut self, df: &DataFrame) -> Result<DataFrame> {
        let start = Instant::now();

        let filled = self.imputer.transform(df)?;

        let columns: Vec<&str> = self
            .config
            .categorical_columns
            .iter()
            .map(|s| s.as_str())
            .collect();
        let mut encoded = self.encoder.fit_transform(&filled, &columns)?;
        debug!(
            indicators = self.encoder.output_columns().len(),
            width = encoded.width(),
            "One-hot encoded categorical columns"
        );

        for name in &self.config.drop_columns {
            encoded = encoded
                .drop(name)
                .map_err(|_| AnalysisError::FeatureNotFound(name.clone()))?;
        }

        self.fit_time = Some(start.elapsed().as_secs_f64());
        Ok(encoded)
    }

    /// Run `encode` and split off the label column
    pub fn prepare(&mut self, df: &DataFrame) -> Result<PreparedData> {
        let encoded = self.encode(df)?;
        let data = PreparedData::from_frame(&encoded, &self.config.target_column)?;

        info!(
            rows = data.n_samples(),
            features = data.n_features(),
            classes = data.labels.n_classes(),
            "Prepared feature matrix"
        );

        Ok(data)
    }

    /// Fitted encoder
    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    /// Configuration in use
    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Seconds spent in the last `encode` call
    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }
}
