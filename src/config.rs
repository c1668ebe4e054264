//! Analysis configuration

use crate::error::{AnalysisError, Result};
use crate::preprocessing::{ImportanceThreshold, PreprocessingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the merged esports dataset, relative to the working directory
pub const DEFAULT_DATA_PATH: &str = "Project/p2/merged_esports_data_updated.csv";

/// Configuration for a single analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// CSV file to load
    pub data_path: PathBuf,

    /// Imputation, encoding and column selection
    pub preprocessing: PreprocessingConfig,

    /// Fraction of rows held out for evaluation
    pub test_size: f64,

    /// Seed for the split and every model
    pub random_state: u64,

    /// Number of trees in the importance (selector) forest
    pub selector_n_estimators: usize,

    /// Importance threshold used by the selector
    pub selection_threshold: ImportanceThreshold,

    /// Iteration cap for logistic regression
    pub logistic_max_iter: usize,

    /// Number of features shown per importance chart
    pub top_k: usize,

    /// Width of the longest bar in characters
    pub chart_bar_width: usize,

    /// Block on "press enter" after the charts when attached to a terminal
    pub wait_for_dismiss: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            preprocessing: PreprocessingConfig::default(),
            test_size: 0.2,
            random_state: 42,
            selector_n_estimators: 100,
            selection_threshold: ImportanceThreshold::Mean,
            logistic_max_iter: 1000,
            top_k: 20,
            chart_bar_width: 40,
            wait_for_dismiss: true,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the data path
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Builder method to replace the preprocessing configuration
    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set the selector forest size
    pub fn with_selector_estimators(mut self, n_estimators: usize) -> Self {
        self.selector_n_estimators = n_estimators;
        self
    }

    /// Builder method to toggle the final "press enter" prompt
    pub fn with_wait_for_dismiss(mut self, wait: bool) -> Self {
        self.wait_for_dismiss = wait;
        self
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(AnalysisError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }
        if self.selector_n_estimators == 0 {
            return Err(AnalysisError::InvalidParameter {
                name: "selector_n_estimators".to_string(),
                value: "0".to_string(),
                reason: "need at least one tree".to_string(),
            });
        }
        if self.logistic_max_iter == 0 {
            return Err(AnalysisError::InvalidParameter {
                name: "logistic_max_iter".to_string(),
                value: "0".to_string(),
                reason: "need at least one iteration".to_string(),
            });
        }
        if self.top_k == 0 {
            return Err(AnalysisError::InvalidParameter {
                name: "top_k".to_string(),
                value: "0".to_string(),
                reason: "must show at least one feature".to_string(),
            });
        }
        if self.preprocessing.target_column.is_empty() {
            return Err(AnalysisError::ConfigError("target column is empty".to_string()));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AnalysisError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
