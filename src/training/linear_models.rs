//! Linear classification models

use super::{argmax, n_classes_of, softmax_in_place, Classifier};
use crate::error::{AnalysisError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Multinomial logistic regression fitted by full-batch gradient descent.
///
/// Features are standardized internally; coefficients live on that scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients, shape (n_features, n_classes)
    coefficients: Option<Array2<f64>>,
    /// Fitted intercept per class
    intercept: Option<Array1<f64>>,
    /// Column means used for standardization
    means: Option<Array1<f64>>,
    /// Column scales used for standardization
    scales: Option<Array1<f64>>,
    /// L2 penalty on the summed log loss (inverse of C)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    /// Fixed step size; derived from the data when unset
    pub learning_rate: Option<f64>,
    n_classes: usize,
    n_iter: usize,
    converged: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            means: None,
            scales: None,
            alpha: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            learning_rate: None,
            n_classes: 0,
            n_iter: 0,
            converged: false,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set convergence tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set a fixed learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = Some(lr);
        self
    }

    /// Fit the model using gradient descent
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
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
                "Cannot fit logistic regression on zero samples".to_string(),
            ));
        }
        if self.max_iter == 0 {
            return Err(AnalysisError::InvalidParameter {
                name: "max_iter".to_string(),
                value: "0".to_string(),
                reason: "need at least one iteration".to_string(),
            });
        }

        let n_classes = n_classes_of(y)?.max(2);

        let means = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let xs = (x - &means) / &scales;

        let targets = Array2::from_shape_fn((n_samples, n_classes), |(i, k)| {
            (y[i] as usize == k) as u8 as f64
        });

        let n = n_samples as f64;
        let penalty = self.alpha / n;
        let lr = match self.learning_rate {
            Some(lr) => lr,
            None => {
                // Step 1/L for the softmax loss: L <= 0.5 * lambda_max(XᵀX / n) + penalty
                let lipschitz = 0.5 * spectral_norm_estimate(&xs).max(1.0) + penalty;
                1.0 / (1.1 * lipschitz)
            }
        };

        let mut weights = Array2::<f64>::zeros((n_features, n_classes));
        let mut bias = Array1::<f64>::zeros(n_classes);
        let mut grad_norm = f64::INFINITY;
        self.converged = false;
        self.n_iter = 0;

        for _iter in 0..self.max_iter {
            self.n_iter += 1;

            let mut probs = xs.dot(&weights) + &bias;
            for mut row in probs.outer_iter_mut() {
                softmax_in_place(&mut row);
            }

            let errors = probs - &targets;
            let dw = xs.t().dot(&errors) / n + &weights * penalty;
            let db = errors.sum_axis(Axis(0)) / n;

            grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                self.converged = true;
                break;
            }

            weights.scaled_add(-lr, &dw);
            bias.scaled_add(-lr, &db);
        }

        if self.converged {
            debug!(iterations = self.n_iter, grad_norm, "Logistic regression converged");
        } else {
            warn!(
                max_iter = self.max_iter,
                grad_norm,
                "Logistic regression reached the iteration limit without converging"
            );
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.means = Some(means);
        self.scales = Some(scales);
        self.n_classes = n_classes;

        Ok(self)
    }

    /// Predict class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (weights, bias, means, scales) = match (
            &self.coefficients,
            &self.intercept,
            &self.means,
            &self.scales,
        ) {
            (Some(w), Some(b), Some(m), Some(s)) => (w, b, m, s),
            _ => return Err(AnalysisError::ModelNotFitted),
        };

        if x.ncols() != weights.nrows() {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} features", weights.nrows()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let xs = (x - means) / scales;
        let mut probs = xs.dot(weights) + bias;
        for mut row in probs.outer_iter_mut() {
            softmax_in_place(&mut row);
        }
        Ok(probs)
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .outer_iter()
            .map(|row| argmax(row.iter().copied()) as f64)
            .collect())
    }

    /// Coefficients on the standardized scale
    pub fn coefficients(&self) -> Option<&Array2<f64>> {
        self.coefficients.as_ref()
    }

    /// Iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Whether the last fit met the tolerance
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Number of classes seen during fit
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

/// Largest eigenvalue of XᵀX / n by power iteration
fn spectral_norm_estimate(x: &Array2<f64>) -> f64 {
    let n = x.nrows().max(1) as f64;
    let d = x.ncols();
    if d == 0 {
        return 0.0;
    }

    let mut v = Array1::from_shape_fn(d, |j| 1.0 + (j % 7) as f64);
    let mut eigenvalue = 0.0;

    for _ in 0..50 {
        let norm = v.dot(&v).sqrt();
        if norm <= f64::EPSILON {
            return eigenvalue;
        }
        v /= norm;
        let w = x.t().dot(&x.dot(&v)) / n;
        eigenvalue = v.dot(&w);
        v = w;
    }

    eigenvalue
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "Logistic Regression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        LogisticRegression::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        LogisticRegression::predict(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_classification() {
        let x = array![
            [1.0, 2.0],
            [2.0, 1.0],
            [1.5, 1.5],
            [5.0, 6.0],
            [6.0, 5.0],
            [5.5, 5.5],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        assert_eq!(model.n_classes(), 2);
    }

    #[test]
    fn test_multiclass_probabilities() {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [5.0, 0.0],
            [5.1, 0.2],
            [0.0, 5.0],
            [0.1, 5.2],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut model = LogisticRegression::new().with_max_iter(500);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 3));
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_unscaled_features_do_not_diverge() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            if j == 0 {
                i as f64 * 1000.0
            } else {
                (i % 3) as f64
            }
        });
        let y = Array1::from_shape_fn(40, |i| (i >= 20) as u8 as f64);

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients().unwrap();
        assert!(coef.iter().all(|v| v.is_finite()));
        let pred = model.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 38);
    }

    #[test]
    fn test_iteration_cap_is_reported() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut model = LogisticRegression::new().with_max_iter(1).with_tol(0.0);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_iter(), 1);
        assert!(!model.converged());
    }

    #[test]
    fn test_constant_column() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(AnalysisError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_spectral_estimate_identity_like() {
        // Orthogonal unit-variance columns -> eigenvalue 1
        let x = array![[1.0, 1.0], [1.0, -1.0], [-1.0, 1.0], [-1.0, -1.0]];
        let lambda = spectral_norm_estimate(&x);
        assert!((lambda - 1.0).abs() < 1e-9);
    }
}
