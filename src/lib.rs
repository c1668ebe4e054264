//! Esports match outcome analysis
//!
//! This crate compares three classifiers on per-player match statistics:
//! - Loading and encoding the merged match table
//! - Forest-importance feature selection
//! - Logistic regression, random forest and gradient boosting
//! - Classification reports and importance charts
//!
//! # Modules
//!
//! - [`preprocessing`] - Imputation, one-hot encoding, splitting, feature selection
//! - [`training`] - Classifiers and classification reports
//! - [`visualization`] - Ranked importance bar charts
//! - [`pipeline`] - The end-to-end analysis run
//! - [`utils`] - CSV loading

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod preprocessing;
pub mod training;

// Output
pub mod visualization;
pub mod pipeline;

// Utilities
pub mod utils;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use pipeline::{Analysis, AnalysisOutcome, ModelReport};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{AnalysisError, Result};

    // Configuration
    pub use crate::config::AnalysisConfig;

    // Preprocessing
    pub use crate::preprocessing::{
        train_test_split, DataPreprocessor, FeatureSelector, ImportanceThreshold,
        OneHotEncoder, PreprocessingConfig,
    };

    // Training
    pub use crate::training::{
        Classifier, ClassificationReport, GradientBoostingClassifier, GradientBoostingConfig,
        LogisticRegression, RandomForest,
    };

    // Visualization
    pub use crate::visualization::{rank_importances, ImportanceChart, RankedFeature};

    // Pipeline
    pub use crate::pipeline::{Analysis, AnalysisOutcome};

    // Utilities
    pub use crate::utils::DataLoader;
}
