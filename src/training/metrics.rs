//! Classification evaluation

use crate::error::{AnalysisError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision, recall and F1
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class metrics plus accuracy, macro and weighted averages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

fn safe_ratio(num: usize, den: usize, metric: &str, label: &str) -> f64 {
    if den == 0 {
        warn!(metric, label, "Ill-defined metric, no samples to divide by; reporting 0.0");
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    /// Build a report from class-index vectors.
    ///
    /// Rows cover every class index present in either vector, named by
    /// `class_names`.
    pub fn compute(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        class_names: &[String],
    ) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(AnalysisError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(AnalysisError::ValidationError(
                "Cannot evaluate an empty prediction set".to_string(),
            ));
        }

        let n_classes = class_names.len();
        let to_class = |v: f64| -> Result<usize> {
            let idx = v as usize;
            if v < 0.0 || v.fract() != 0.0 || idx >= n_classes {
                return Err(AnalysisError::ValidationError(format!(
                    "Class index {} outside 0..{}",
                    v, n_classes
                )));
            }
            Ok(idx)
        };

        let mut true_pos = vec![0usize; n_classes];
        let mut predicted = vec![0usize; n_classes];
        let mut support = vec![0usize; n_classes];
        let mut correct = 0usize;

        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let t = to_class(t)?;
            let p = to_class(p)?;
            support[t] += 1;
            predicted[p] += 1;
            if t == p {
                true_pos[t] += 1;
                correct += 1;
            }
        }

        let classes: Vec<ClassMetrics> = (0..n_classes)
            .filter(|&k| support[k] > 0 || predicted[k] > 0)
            .map(|k| {
                let label = &class_names[k];
                let precision = safe_ratio(true_pos[k], predicted[k], "precision", label);
                let recall = safe_ratio(true_pos[k], support[k], "recall", label);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1_score,
                    support: support[k],
                }
            })
            .collect();

        let total = y_true.len();
        let n_rows = classes.len() as f64;

        let macro_avg = AverageMetrics {
            precision: classes.iter().map(|c| c.precision).sum::<f64>() / n_rows,
            recall: classes.iter().map(|c| c.recall).sum::<f64>() / n_rows,
            f1_score: classes.iter().map(|c| c.f1_score).sum::<f64>() / n_rows,
            support: total,
        };

        let weight = |f: fn(&ClassMetrics) -> f64| -> f64 {
            classes.iter().map(|c| f(c) * c.support as f64).sum::<f64>() / total as f64
        };
        let weighted_avg = AverageMetrics {
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1_score: weight(|c| c.f1_score),
            support: total,
        };

        Ok(Self {
            accuracy: correct as f64 / total as f64,
            classes,
            macro_avg,
            weighted_avg,
        })
    }

    /// Total number of evaluated samples
    pub fn total_support(&self) -> usize {
        self.macro_avg.support
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const WEIGHTED: &str = "weighted avg";
        let width = self
            .classes
            .iter()
            .map(|c| c.label.chars().count())
            .max()
            .unwrap_or(0)
            .max(WEIGHTED.len());

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support",
            width = width
        )?;
        writeln!(f)?;

        for c in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1_score, c.support,
                width = width
            )?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total_support(),
            width = width
        )?;
        for (name, avg) in [("macro avg", &self.macro_avg), (WEIGHTED, &self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1_score, avg.support,
                width = width
            )?;
        }
        Ok(())
    }
}
