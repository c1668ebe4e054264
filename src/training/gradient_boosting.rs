//! Gradient Boosting implementation
//!
//! Log-loss boosting of shallow regression trees. Binary targets grow one
//! tree per round on the log-odds; multiclass targets grow one tree per class
//! per round on softmax scores. Each tree is grown on the residuals, then its
//! leaves are reset to a single Newton step: `sum(r) / sum(p (1 - p))` over
//! the rows in the leaf, scaled by `(K - 1) / K` for `K > 2` classes.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision_tree::DecisionTree;
use super::{argmax, n_classes_of, softmax_in_place, Classifier};
use crate::error::{AnalysisError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each round
    pub subsample: f64,
    /// Column subsample ratio
    pub colsample_bytree: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

impl GradientBoostingConfig {
    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(AnalysisError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "need at least one boosting round".to_string(),
            });
        }
        if !(self.learning_rate > 0.0) {
            return Err(AnalysisError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        for (name, ratio) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(AnalysisError::InvalidParameter {
                    name: name.to_string(),
                    value: ratio.to_string(),
                    reason: "must be in (0, 1]".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One fitted regression tree and the columns it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stage {
    tree: DecisionTree,
    col_indices: Vec<usize>,
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    config: GradientBoostingConfig,
    /// One entry per round; each round holds one stage per score column
    stages: Vec<Vec<Stage>>,
    /// Starting score per column (log-odds for binary, log-prior for multiclass)
    initial_scores: Vec<f64>,
    n_classes: usize,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
            initial_scores: Vec::new(),
            n_classes: 0,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.config.random_state = Some(seed);
        self
    }

    /// Number of score columns: 1 for binary, one per class otherwise
    fn n_scores(n_classes: usize) -> usize {
        if n_classes <= 2 {
            1
        } else {
            n_classes
        }
    }

    /// Fit on class-index targets
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(AnalysisError::ValidationError(
                "Cannot fit gradient boosting on zero samples".to_string(),
            ));
        }

        self.n_classes = n_classes_of(y)?.max(2);
        self.n_features = n_features;
        let n_scores = Self::n_scores(self.n_classes);

        // One-hot targets, one column per score
        let targets = Array2::from_shape_fn((n_samples, n_scores), |(i, k)| {
            let class = y[i] as usize;
            if n_scores == 1 {
                (class == 1) as u8 as f64
            } else {
                (class == k) as u8 as f64
            }
        });

        self.initial_scores = (0..n_scores)
            .map(|k| {
                let p = targets.column(k).mean().unwrap_or(0.5).clamp(1e-10, 1.0 - 1e-10);
                if n_scores == 1 {
                    (p / (1.0 - p)).ln()
                } else {
                    p.ln()
                }
            })
            .collect();

        let mut scores = Array2::from_shape_fn((n_samples, n_scores), |(_, k)| self.initial_scores[k]);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];
        self.stages.clear();

        for _ in 0..self.config.n_estimators {
            let probs = self.probabilities(&scores);
            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let mut round = Vec::with_capacity(n_scores);
            for k in 0..n_scores {
                // Negative gradient of log loss
                let p_k = probs.column(k).to_owned();
                let residuals: Array1<f64> = targets
                    .column(k)
                    .iter()
                    .zip(p_k.iter())
                    .map(|(t, p)| t - p)
                    .collect();

                let col_indices = self.colsample_indices(n_features, &mut rng);
                let (x_sub, y_sub) = subsample_data(x, &residuals, &sample_indices, &col_indices);

                let mut tree = DecisionTree::new_regressor()
                    .with_max_depth(self.config.max_depth)
                    .with_min_samples_split(self.config.min_samples_split)
                    .with_min_samples_leaf(self.config.min_samples_leaf);
                tree.fit(&x_sub, &y_sub)?;
                self.newton_leaf_values(&mut tree, &x_sub, &sample_indices, &residuals, &p_k)?;

                // Update every row, sampled or not
                let x_cols = x.select(Axis(1), &col_indices);
                let tree_pred = tree.predict(&x_cols)?;
                let mut column = scores.column_mut(k);
                column.scaled_add(self.config.learning_rate, &tree_pred);

                if let Some(tree_importance) = tree.raw_feature_importances() {
                    for (&col_idx, &imp) in col_indices.iter().zip(tree_importance.iter()) {
                        importances[col_idx] += imp;
                    }
                }

                round.push(Stage { tree, col_indices });
            }
            self.stages.push(round);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        debug!(
            rounds = self.stages.len(),
            n_classes = self.n_classes,
            "Gradient boosting fitted"
        );

        Ok(())
    }

    /// Replace the leaf means of a residual tree with Newton steps
    fn newton_leaf_values(
        &self,
        tree: &mut DecisionTree,
        x_sub: &Array2<f64>,
        sample_indices: &[usize],
        residuals: &Array1<f64>,
        probs: &Array1<f64>,
    ) -> Result<()> {
        let n_leaves = tree.get_n_leaves();
        let mut numerator = vec![0.0; n_leaves];
        let mut denominator = vec![0.0; n_leaves];

        for (row, leaf) in tree.apply(x_sub)?.into_iter().enumerate() {
            let i = sample_indices[row];
            numerator[leaf] += residuals[i];
            denominator[leaf] += probs[i] * (1.0 - probs[i]);
        }

        let k = Self::n_scores(self.n_classes) as f64;
        let scale = if k > 1.0 { (k - 1.0) / k } else { 1.0 };

        let values: Vec<f64> = numerator
            .iter()
            .zip(denominator.iter())
            .map(|(&num, &den)| if den.abs() < 1e-150 { 0.0 } else { scale * num / den })
            .collect();
        tree.set_leaf_values(&values)
    }

    /// Raw scores for each score column
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.stages.is_empty() {
            return Err(AnalysisError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let n_scores = self.initial_scores.len();
        let mut scores = Array2::from_shape_fn((x.nrows(), n_scores), |(_, k)| self.initial_scores[k]);

        for round in &self.stages {
            for (k, stage) in round.iter().enumerate() {
                let x_sub = x.select(Axis(1), &stage.col_indices);
                let tree_pred = stage.tree.predict(&x_sub)?;
                scores.column_mut(k).scaled_add(self.config.learning_rate, &tree_pred);
            }
        }

        Ok(scores)
    }

    /// Convert raw scores to per-score-column probabilities
    fn probabilities(&self, scores: &Array2<f64>) -> Array2<f64> {
        if scores.ncols() == 1 {
            scores.mapv(|s| 1.0 / (1.0 + (-s).exp()))
        } else {
            let mut probs = scores.clone();
            for mut row in probs.outer_iter_mut() {
                softmax_in_place(&mut row);
            }
            probs
        }
    }

    /// Predict class indices
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .outer_iter()
            .map(|row| argmax(row.iter().copied()) as f64)
            .collect())
    }

    /// Predict class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scores = self.decision_function(x)?;
        let probs = self.probabilities(&scores);

        if probs.ncols() == 1 {
            let p1 = probs.column(0);
            Ok(Array2::from_shape_fn((x.nrows(), 2), |(i, k)| {
                if k == 1 {
                    p1[i]
                } else {
                    1.0 - p1[i]
                }
            }))
        } else {
            Ok(probs)
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Number of classes seen during fit
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Number of fitted rounds
    pub fn n_rounds(&self) -> usize {
        self.stages.len()
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.config.subsample).ceil() as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size.max(1));
        indices.sort_unstable();
        indices
    }

    fn colsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.colsample_bytree >= 1.0 {
            return (0..n).collect();
        }
        let sample_size = ((n as f64) * self.config.colsample_bytree).ceil() as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);
        indices.truncate(sample_size.max(1));
        indices.sort_unstable();
        indices
    }
}

fn subsample_data(
    x: &Array2<f64>,
    y: &Array1<f64>,
    row_indices: &[usize],
    col_indices: &[usize],
) -> (Array2<f64>, Array1<f64>) {
    let x_rows = x.select(Axis(0), row_indices);
    let x_sub = x_rows.select(Axis(1), col_indices);
    let y_sub: Array1<f64> = row_indices.iter().map(|&i| y[i]).collect();
    (x_sub, y_sub)
}

impl Classifier for GradientBoostingClassifier {
    fn name(&self) -> &'static str {
        "Gradient Boosting"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingClassifier::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingClassifier::predict(self, x)
    }

    fn feature_importances(&self) -> Option<&Array1<f64>> {
        GradientBoostingClassifier::feature_importances(self)
    }
}
