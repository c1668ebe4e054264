//! End-to-end match outcome analysis
//!
//! Load, encode, split, select by forest importance, fit three classifiers,
//! report, and rank importances for the charts.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::preprocessing::{train_test_split, DataPreprocessor, FeatureSelector};
use crate::training::{
    Classifier, ClassificationReport, GradientBoostingClassifier, GradientBoostingConfig,
    LogisticRegression, RandomForest,
};
use crate::utils::DataLoader;
use crate::visualization::{rank_importances, ImportanceChart, RankedFeature, LIGHT_GREEN, SKY_BLUE};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Classification report for one model
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub model: String,
    pub report: ClassificationReport,
}

/// Everything a run produces
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    /// Rows and columns of the encoded feature matrix
    pub n_samples: usize,
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
    /// Columns kept by the importance selector, in original order
    pub selected_features: Vec<String>,
    /// Importance cutoff used by the selector
    pub selection_threshold: f64,
    /// Length limit of the ranked lists
    pub top_k: usize,
    /// Logistic regression, random forest, gradient boosting
    pub reports: Vec<ModelReport>,
    /// Top selector-forest importances over every encoded column
    pub forest_importances: Vec<RankedFeature>,
    /// Top gradient boosting importances over the selected columns
    pub boosting_importances: Vec<RankedFeature>,
}

impl AnalysisOutcome {
    /// Report for a model by display name
    pub fn report(&self, model: &str) -> Option<&ClassificationReport> {
        self.reports
            .iter()
            .find(|r| r.model == model)
            .map(|r| &r.report)
    }

    /// Two-panel importance chart
    pub fn chart(&self, bar_width: usize) -> ImportanceChart {
        ImportanceChart::new(bar_width)
            .with_panel(
                format!("Top {} Feature Importances - Random Forest", self.top_k),
                SKY_BLUE,
                self.forest_importances.clone(),
            )
            .with_panel(
                format!("Top {} Feature Importances - Gradient Boosting", self.top_k),
                LIGHT_GREEN,
                self.boosting_importances.clone(),
            )
    }
}

/// Runs the analysis described by an [`AnalysisConfig`]
pub struct Analysis {
    config: AnalysisConfig,
}

impl Analysis {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load the configured CSV and run every step
    pub fn run(&self) -> Result<AnalysisOutcome> {
        self.config.validate()?;

        let start = Instant::now();
        let loader = DataLoader::new();
        let file_info = loader.get_file_info(&self.config.data_path)?;
        debug!(
            file_size = file_info.file_size,
            rows = file_info.n_rows,
            columns = file_info.n_cols,
            "Found dataset file"
        );

        let df = loader.load_csv(&self.config.data_path)?;
        info!(
            path = %self.config.data_path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded dataset"
        );

        self.run_on_frame(&df)
    }

    /// Run every step after loading on an in-memory table
    pub fn run_on_frame(&self, df: &DataFrame) -> Result<AnalysisOutcome> {
        self.config.validate()?;
        let config = &self.config;

        // Encode the whole table before splitting
        let start = Instant::now();
        let mut preprocessor = DataPreprocessor::with_config(config.preprocessing.clone());
        let data = preprocessor.prepare(df)?;
        if data.n_samples() == 0 {
            return Err(AnalysisError::DataError("Dataset has no rows".to_string()));
        }
        info!(
            rows = data.n_samples(),
            features = data.n_features(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Encoded features"
        );

        let split = train_test_split(&data.x, &data.y, config.test_size, config.random_state)?;
        info!(
            train = split.x_train.nrows(),
            test = split.x_test.nrows(),
            seed = config.random_state,
            "Split train/test"
        );

        // Importance forest over every encoded column
        let start = Instant::now();
        let mut selector_forest =
            RandomForest::new(config.selector_n_estimators).with_random_state(config.random_state);
        selector_forest.fit(&split.x_train, &split.y_train)?;
        let forest_scores = selector_forest
            .feature_importances()
            .ok_or(AnalysisError::ModelNotFitted)?
            .to_vec();

        let mut selector = FeatureSelector::from_model(config.selection_threshold)
            .with_feature_names(data.feature_names.clone());
        selector.fit_importances(&forest_scores)?;
        let x_train = selector.transform(&split.x_train)?;
        let x_test = selector.transform(&split.x_test)?;
        let selected_features = selector.selected_names().unwrap_or_default();
        let selection_threshold = selector.threshold().unwrap_or(0.0);
        info!(
            selected = selected_features.len(),
            of = data.n_features(),
            threshold = selection_threshold,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Selected features by forest importance"
        );

        let class_names = data.labels.classes();
        let mut reports = Vec::with_capacity(3);

        let mut logistic = LogisticRegression::new().with_max_iter(config.logistic_max_iter);
        reports.push(evaluate(&mut logistic, &x_train, &split.y_train, &x_test, &split.y_test, class_names)?);

        let mut forest = RandomForest::default().with_random_state(config.random_state);
        reports.push(evaluate(&mut forest, &x_train, &split.y_train, &x_test, &split.y_test, class_names)?);

        let mut boosting = GradientBoostingClassifier::new(GradientBoostingConfig {
            random_state: Some(config.random_state),
            ..GradientBoostingConfig::default()
        });
        reports.push(evaluate(&mut boosting, &x_train, &split.y_train, &x_test, &split.y_test, class_names)?);

        let forest_importances = rank_importances(&data.feature_names, &forest_scores, config.top_k)?;
        let boosting_scores = boosting
            .feature_importances()
            .ok_or(AnalysisError::ModelNotFitted)?
            .to_vec();
        let boosting_importances = rank_importances(&selected_features, &boosting_scores, config.top_k)?;

        Ok(AnalysisOutcome {
            n_samples: data.n_samples(),
            n_features: data.n_features(),
            n_train: split.x_train.nrows(),
            n_test: split.x_test.nrows(),
            selected_features,
            selection_threshold,
            top_k: config.top_k,
            reports,
            forest_importances,
            boosting_importances,
        })
    }
}

/// Fit on the training rows and report on the test rows
fn evaluate<C: Classifier>(
    model: &mut C,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
    class_names: &[String],
) -> Result<ModelReport> {
    let start = Instant::now();
    model.fit(x_train, y_train)?;
    let predictions = model.predict(x_test)?;
    let report = ClassificationReport::compute(y_test, &predictions, class_names)?;

    info!(
        model = model.name(),
        accuracy = report.accuracy,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Trained and evaluated"
    );
    debug!(model = model.name(), "\n{}", report);

    Ok(ModelReport {
        model: model.name().to_string(),
        report,
    })
}
