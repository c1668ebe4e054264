//! Preprocessing configuration

use serde::{Deserialize, Serialize};

/// Configuration for turning the raw match table into model inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Constant written into every missing cell
    pub fill_value: f64,

    /// Columns expanded into indicator columns
    pub categorical_columns: Vec<String>,

    /// Drop the first sorted category of each encoded column
    pub drop_first: bool,

    /// Columns removed after encoding; each must exist
    pub drop_columns: Vec<String>,

    /// Label column
    pub target_column: String,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            fill_value: 0.0,
            categorical_columns: ["map_type", "map_name", "player_name", "team_name", "hero_name"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            drop_first: true,
            drop_columns: ["team_one_name", "team_two_name", "match_id"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            target_column: "match_winner".to_string(),
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the fill value
    pub fn with_fill_value(mut self, value: f64) -> Self {
        self.fill_value = value;
        self
    }

    /// Builder method to set the categorical columns
    pub fn with_categorical_columns(mut self, columns: &[&str]) -> Self {
        self.categorical_columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Builder method to set the columns dropped after encoding
    pub fn with_drop_columns(mut self, columns: &[&str]) -> Self {
        self.drop_columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Builder method to set the label column
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_column = target.into();
        self
    }

    /// Builder method to keep every category
    pub fn with_drop_first(mut self, drop_first: bool) -> Self {
        self.drop_first = drop_first;
        self
    }
}
