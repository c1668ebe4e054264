//! Random Forest implementation

use super::decision_tree::{Criterion, DecisionTree};
use super::{argmax, n_classes_of, Classifier};
use crate::error::{AnalysisError, Result};
use ndarray::{s, Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Random Forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
    /// Number of classes
    n_classes: usize,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Resolve to a feature count for a matrix of the given width
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        match *self {
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n * f).floor() as usize,
            MaxFeatures::Fixed(k) => k,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            criterion: Criterion::Gini,
            random_state: None,
            feature_importances: None,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Toggle bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(AnalysisError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "need at least one tree".to_string(),
            });
        }
        if n_samples == 0 {
            return Err(AnalysisError::ValidationError(
                "Cannot fit a forest on zero samples".to_string(),
            ));
        }

        self.n_features = n_features;
        self.n_classes = n_classes_of(y)?;
        let max_features = self.max_features.resolve(n_features);

        // Build trees in parallel; each tree owns a seed derived from its index
        let base_seed = self.random_state.unwrap_or(42);

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> = sample_indices.iter().map(|&i| y[i]).collect();

                let mut tree = DecisionTree::new_classifier()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_criterion(self.criterion)
                    .with_max_features(max_features)
                    .with_random_state(rng.gen());

                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.compute_feature_importances();

        debug!(
            n_trees = self.trees.len(),
            max_features,
            n_classes = self.n_classes,
            "Random forest fitted"
        );

        Ok(self)
    }

    /// Mean of per-tree importances, renormalized to sum to one
    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (total, &val) in total_importances.iter_mut().zip(imp.iter()) {
                    *total += val;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        for imp in &mut total_importances {
            *imp /= n_trees;
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Predict the class with the highest mean leaf probability
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .outer_iter()
            .map(|row| argmax(row.iter().copied()) as f64)
            .collect())
    }

    /// Mean over trees of the class fractions in each row's leaf
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(AnalysisError::ModelNotFitted);
        }

        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<_>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for tree_proba in &per_tree {
            // A bootstrap sample can miss the highest classes
            let width = tree_proba.ncols().min(self.n_classes);
            let mut target = proba.slice_mut(s![.., ..width]);
            target += &tree_proba.slice(s![.., ..width]);
        }
        proba /= per_tree.len() as f64;

        Ok(proba)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of classes seen during fit
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }

    fn feature_importances(&self) -> Option<&Array1<f64>> {
        RandomForest::feature_importances(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.1, 0.1],
            [0.2, 0.2],
            [1.0, 1.0],
            [1.1, 1.1],
            [1.2, 1.2],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_classifier() {
        let (x, y) = separable();

        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let correct = predictions
            .iter()
            .zip(y.iter())
            .filter(|(p, a)| (*p - *a).abs() < 0.5)
            .count();
        assert!(correct >= 5, "Random forest accuracy too low: {}/6", correct);
        assert_eq!(rf.n_trees(), 10);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = separable();

        let mut rf = RandomForest::new(15).with_random_state(1);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 2));
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_proba_averages_leaf_fractions() {
        // Rows 0..3 share a value but disagree on the label
        let x = array![[0.0], [0.0], [0.0], [1.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0, 0.0, 0.0];

        let mut rf = RandomForest::new(1).with_bootstrap(false).with_random_state(3);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&array![[0.0], [1.0]]).unwrap();
        assert!((proba[[0, 1]] - 2.0 / 3.0).abs() < 1e-12);
        assert!((proba[[1, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(rf.predict(&array![[0.0]]).unwrap()[0], 1.0);
    }

    #[test]
    fn test_reproducible_with_seed() {
        let x = Array2::from_shape_fn((60, 5), |(i, j)| ((i * 7 + j * 13) % 11) as f64);
        let y = Array1::from_shape_fn(60, |i| ((i * 7) % 11 > 5) as u8 as f64);

        let mut a = RandomForest::new(20).with_random_state(42);
        let mut b = RandomForest::new(20).with_random_state(42);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.feature_importances(), b.feature_importances());
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_importances_normalized() {
        let x = Array2::from_shape_fn((50, 4), |(i, j)| if j == 0 { i as f64 } else { ((i * j) % 3) as f64 });
        let y = Array1::from_shape_fn(50, |i| (i >= 25) as u8 as f64);

        let mut rf = RandomForest::new(25).with_random_state(0);
        rf.fit(&x, &y).unwrap();

        let imp = rf.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(100), 10);
        assert_eq!(MaxFeatures::Sqrt.resolve(3), 1);
        assert_eq!(MaxFeatures::Log2.resolve(8), 3);
        assert_eq!(MaxFeatures::Fixed(50).resolve(10), 10);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
    }

    #[test]
    fn test_not_fitted() {
        let rf = RandomForest::new(5);
        assert!(matches!(
            rf.predict(&array![[0.0, 1.0]]),
            Err(AnalysisError::ModelNotFitted)
        ));
    }
}
