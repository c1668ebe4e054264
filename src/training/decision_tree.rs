//! Decision tree implementation

use super::n_classes_of;
use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
        /// Class fractions of the training rows (empty for regression)
        distribution: Vec<f64>,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split, drawn at random; `None` means all
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Seed for per-node feature sampling
    pub random_state: Option<u64>,
    /// Number of features
    n_features: usize,
    /// Number of classes (classification)
    n_classes: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Weighted impurity decrease per feature, before normalization
    raw_importances: Option<Array1<f64>>,
    /// Is classification task
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree; targets are class indices
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: None,
            raw_importances: None,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set the number of features drawn per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        if n_samples == 0 || n_features == 0 {
            return Err(AnalysisError::ValidationError(format!(
                "Cannot fit a tree on a {}x{} matrix",
                n_samples, n_features
            )));
        }

        if self.is_classification {
            self.n_classes = n_classes_of(y)?;
        }
        self.n_features = n_features;

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, indices, 0, &mut importances, &mut rng));

        // Raw MDI is the impurity decrease per training row
        self.raw_importances = Some(
            importances.iter().map(|&imp| imp / n_samples as f64).collect(),
        );

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let node_impurity = self.node_impurity(y, &indices);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || node_impurity <= 1e-12;

        if should_stop {
            return self.leaf(y, &indices);
        }

        let features = self.candidate_features(x, &indices, rng);
        let best = match self.find_best_split(x, y, &indices, &features, node_impurity) {
            Some(best) => best,
            None => return self.leaf(y, &indices),
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, y, left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: node_impurity,
        }
    }

    /// Features to scan at one node.
    ///
    /// With `max_features` set, features are visited in random order and the
    /// first `max_features` that vary within the node are kept.
    fn candidate_features(
        &self,
        x: &Array2<f64>,
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Vec<usize> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        if let Some(m) = self.max_features.filter(|&m| m < self.n_features) {
            features.shuffle(rng);
            features = features
                .into_iter()
                .filter(|&f| varies_within(x, indices, f))
                .take(m)
                .collect();
            features.sort_unstable();
        }
        features
    }

    /// Sorted sweep over each candidate feature; ties keep the lowest feature index
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
    ) -> Option<SplitCandidate> {
        let n = indices.len();

        let feature_results: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> = indices
                    .iter()
                    .map(|&i| (x[[i, feature_idx]], y[i]))
                    .collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left = ImpurityStats::new(self.n_classes);
                let mut right = ImpurityStats::new(self.n_classes);
                for &(_, yi) in &pairs {
                    right.add(yi, self.is_classification);
                }

                let mut best: Option<SplitCandidate> = None;

                for pos in 0..n - 1 {
                    let (value, yi) = pairs[pos];
                    left.add(yi, self.is_classification);
                    right.remove(yi, self.is_classification);

                    let next_value = pairs[pos + 1].0;
                    if next_value <= value {
                        continue;
                    }

                    let n_left = pos + 1;
                    let n_right = n - n_left;
                    if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (n_left as f64 * left.impurity(self.criterion)
                        + n_right as f64 * right.impurity(self.criterion))
                        / n as f64;
                    let gain = parent_impurity - weighted;

                    if gain > 1e-15 && best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (value + next_value) / 2.0,
                            gain,
                        });
                    }
                }

                best
            })
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<SplitCandidate>, cand| match acc {
                Some(a) if a.gain >= cand.gain => Some(a),
                _ => Some(cand),
            })
    }

    fn node_impurity(&self, y: &Array1<f64>, indices: &[usize]) -> f64 {
        let mut stats = ImpurityStats::new(self.n_classes);
        for &i in indices {
            stats.add(y[i], self.is_classification);
        }
        stats.impurity(self.criterion)
    }

    fn leaf(&self, y: &Array1<f64>, indices: &[usize]) -> TreeNode {
        let n_samples = indices.len();
        if !self.is_classification {
            let value = if n_samples == 0 {
                0.0
            } else {
                indices.iter().map(|&i| y[i]).sum::<f64>() / n_samples as f64
            };
            return TreeNode::Leaf { value, n_samples, distribution: Vec::new() };
        }

        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[y[i] as usize] += 1;
        }
        // Majority class, lowest index on ties
        let mut best = 0;
        for (class, &count) in counts.iter().enumerate() {
            if count > counts[best] {
                best = class;
            }
        }
        let distribution = counts
            .iter()
            .map(|&c| if n_samples == 0 { 0.0 } else { c as f64 / n_samples as f64 })
            .collect();

        TreeNode::Leaf { value: best as f64, n_samples, distribution }
    }

    fn fitted_root(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(AnalysisError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.fitted_root(x)?;
        Ok(x.outer_iter()
            .map(|sample| match Self::leaf_for(root, sample) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => 0.0,
            })
            .collect())
    }

    /// Class fractions of the leaf each row lands in
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classification {
            return Err(AnalysisError::TrainingError(
                "predict_proba needs a classifier tree".to_string(),
            ));
        }
        let root = self.fitted_root(x)?;

        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (mut out, sample) in proba.outer_iter_mut().zip(x.outer_iter()) {
            if let TreeNode::Leaf { distribution, .. } = Self::leaf_for(root, sample) {
                for (o, &p) in out.iter_mut().zip(distribution.iter()) {
                    *o = p;
                }
            }
        }
        Ok(proba)
    }

    /// Index of the leaf each row lands in, leaves numbered depth-first
    pub fn apply(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.fitted_root(x)?;
        Ok(x.outer_iter()
            .map(|sample| Self::leaf_index(root, sample, 0))
            .collect())
    }

    /// Overwrite leaf values in depth-first leaf order
    pub fn set_leaf_values(&mut self, values: &[f64]) -> Result<()> {
        let n_leaves = self.get_n_leaves();
        if values.len() != n_leaves {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} leaf values", n_leaves),
                actual: format!("{} leaf values", values.len()),
            });
        }
        if let Some(root) = self.root.as_mut() {
            let mut next = values.iter();
            Self::assign_leaves(root, &mut next);
        }
        Ok(())
    }

    fn assign_leaves<'a>(node: &mut TreeNode, values: &mut impl Iterator<Item = &'a f64>) {
        match node {
            TreeNode::Leaf { value, .. } => {
                if let Some(&v) = values.next() {
                    *value = v;
                }
            }
            TreeNode::Split { left, right, .. } => {
                Self::assign_leaves(left, values);
                Self::assign_leaves(right, values);
            }
        }
    }

    fn leaf_for<'a>(node: &'a TreeNode, sample: ArrayView1<f64>) -> &'a TreeNode {
        match node {
            TreeNode::Leaf { .. } => node,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::leaf_for(left, sample)
                } else {
                    Self::leaf_for(right, sample)
                }
            }
        }
    }

    fn leaf_index(node: &TreeNode, sample: ArrayView1<f64>, offset: usize) -> usize {
        match node {
            TreeNode::Leaf { .. } => offset,
            TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                if sample[*feature_idx] <= *threshold {
                    Self::leaf_index(left, sample, offset)
                } else {
                    Self::leaf_index(right, sample, offset + Self::count_leaves(left))
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Impurity decrease per feature, weighted by node size and not normalized
    pub fn raw_feature_importances(&self) -> Option<&Array1<f64>> {
        self.raw_importances.as_ref()
    }

    /// Number of classes seen during fit
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::node_depth(node),
        }
    }

    fn node_depth(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => {
                1 + Self::node_depth(left).max(Self::node_depth(right))
            }
        }
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        match &self.root {
            None => 0,
            Some(node) => Self::count_leaves(node),
        }
    }

    fn count_leaves(node: &TreeNode) -> usize {
        match node {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => {
                Self::count_leaves(left) + Self::count_leaves(right)
            }
        }
    }
}

fn varies_within(x: &Array2<f64>, indices: &[usize], feature_idx: usize) -> bool {
    let mut values = indices.iter().map(|&i| x[[i, feature_idx]]);
    match values.next() {
        Some(first) => values.any(|v| v != first),
        None => false,
    }
}

/// Incremental statistics for one side of a candidate split
#[derive(Debug, Clone)]
struct ImpurityStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: Vec<usize>,
}

impl ImpurityStats {
    fn new(n_classes: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sq_sum: 0.0,
            class_counts: vec![0; n_classes],
        }
    }

    fn add(&mut self, y: f64, classification: bool) {
        self.count += 1;
        if classification {
            self.class_counts[y as usize] += 1;
        } else {
            self.sum += y;
            self.sq_sum += y * y;
        }
    }

    fn remove(&mut self, y: f64, classification: bool) {
        self.count -= 1;
        if classification {
            self.class_counts[y as usize] -= 1;
        } else {
            self.sum -= y;
            self.sq_sum -= y * y;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => {
                1.0 - self
                    .class_counts
                    .iter()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum::<f64>()
            }
            Criterion::Entropy => -self
                .class_counts
                .iter()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            Criterion::MSE => {
                // Var = E[X²] - E[X]²
                (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_simple() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        assert_eq!(predictions, y);
    }

    #[test]
    fn test_multiclass() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0], [20.0], [21.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0];

        let mut tree = DecisionTree::new_classifier().with_criterion(Criterion::Entropy);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.n_classes(), 3);
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        let predictions = tree.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 1e-9, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(1);
        tree.fit(&x, &y).unwrap();

        assert!(tree.get_depth() <= 2);
        assert!(tree.get_n_leaves() <= 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_raw_importances_are_impurity_decrease() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        // One split takes Gini from 0.5 to 0
        let raw = tree.raw_feature_importances().unwrap();
        assert!((raw[0] - 0.5).abs() < 1e-12);
        assert_eq!(raw[1], 0.0);
    }

    #[test]
    fn test_leaf_class_fractions() {
        // Duplicate rows with mixed labels cannot be separated
        let x = array![[0.0], [0.0], [0.0], [1.0]];
        let y = array![0.0, 1.0, 1.0, 0.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&array![[0.0], [1.0]]).unwrap();
        assert!((proba[[0, 1]] - 2.0 / 3.0).abs() < 1e-12);
        assert!((proba[[1, 0]] - 1.0).abs() < 1e-12);
        assert_eq!(tree.predict(&array![[0.0]]).unwrap()[0], 1.0);
    }

    #[test]
    fn test_apply_and_set_leaf_values() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 5.0, 5.0];

        let mut tree = DecisionTree::new_regressor().with_max_depth(1);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.apply(&x).unwrap(), vec![0, 0, 1, 1]);

        tree.set_leaf_values(&[-1.0, 2.0]).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), array![-1.0, -1.0, 2.0, 2.0]);
        assert!(tree.set_leaf_values(&[1.0]).is_err());
    }

    #[test]
    fn test_feature_sampling_is_seeded() {
        let x = Array2::from_shape_fn((40, 6), |(i, j)| ((i * (j + 3)) % 7) as f64);
        let y = Array1::from_shape_fn(40, |i| (i % 2) as f64);

        let mut a = DecisionTree::new_classifier().with_max_features(2).with_random_state(3);
        let mut b = DecisionTree::new_classifier().with_max_features(2).with_random_state(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.feature_importances(), b.feature_importances());
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(
            tree.predict(&array![[1.0]]),
            Err(AnalysisError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_rejects_non_class_labels() {
        let x = array![[1.0], [2.0]];
        let y = array![0.5, 1.0];
        let mut tree = DecisionTree::new_classifier();
        assert!(tree.fit(&x, &y).is_err());
    }
}
