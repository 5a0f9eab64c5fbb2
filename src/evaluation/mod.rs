//! Held-out evaluation
//!
//! Precision, recall and F1 of the fraud class. Each ratio is defined as
//! 0.0 when its denominator is zero, so a model that never predicts fraud
//! scores 0.0 precision rather than failing.

use crate::error::{PipelineError, Result};
use crate::training::Classifier;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary confusion counts with fraud as the positive class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    /// Count each `(truth, prediction)` pair once. Values above 0.5 are fraud.
    pub fn from_labels(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }

        let mut cm = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.true_positives += 1,
                (false, true) => cm.false_positives += 1,
                (false, false) => cm.true_negatives += 1,
                (true, false) => cm.false_negatives += 1,
            }
        }
        Ok(cm)
    }

    /// Number of rows counted
    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1_score(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Evaluation summary stored in run metadata
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub confusion: ConfusionMatrix,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub accuracy: f64,
}

impl Metrics {
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        Self {
            confusion,
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1_score: confusion.f1_score(),
            accuracy: confusion.accuracy(),
        }
    }

    /// Rows evaluated
    pub fn support(&self) -> usize {
        self.confusion.total()
    }

    /// Actual fraud rows evaluated
    pub fn fraud_support(&self) -> usize {
        self.confusion.true_positives + self.confusion.false_negatives
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "precision={:.4} recall={:.4} f1={:.4} accuracy={:.4} (n={}, fraud={})",
            self.precision,
            self.recall,
            self.f1_score,
            self.accuracy,
            self.support(),
            self.fraud_support()
        )
    }
}

/// Score a classifier on held-out features and labels
pub fn evaluate<C: Classifier + ?Sized>(
    model: &C,
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<Metrics> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    let predictions = model.predict(x)?;
    let metrics = Metrics::from_confusion(ConfusionMatrix::from_labels(y, &predictions)?);
    tracing::debug!(%metrics, "Evaluated classifier");
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Constant(f64);

    impl Classifier for Constant {
        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            Ok(Array1::from_elem(x.nrows(), self.0))
        }
    }

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred).unwrap();
        assert_eq!(cm.true_positives, 3);
        assert_eq!(cm.false_negatives, 1);
        assert_eq!(cm.false_positives, 1);
        assert_eq!(cm.true_negatives, 3);
        assert_eq!(cm.total(), 8);

        let metrics = Metrics::from_confusion(cm);
        assert!((metrics.precision - 0.75).abs() < 1e-12);
        assert!((metrics.recall - 0.75).abs() < 1e-12);
        assert!((metrics.f1_score - 0.75).abs() < 1e-12);
        assert!((metrics.accuracy - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_never_fraud_model_scores_zero() {
        let x = Array2::zeros((10, 2));
        let y = Array1::from_shape_fn(10, |i| if i < 2 { 1.0 } else { 0.0 });

        let metrics = evaluate(&Constant(0.0), &x, &y).unwrap();
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1_score, 0.0);
        assert!((metrics.accuracy - 0.8).abs() < 1e-12);
        assert_eq!(metrics.support(), 10);
        assert_eq!(metrics.fraud_support(), 2);
    }

    #[test]
    fn test_all_negative_truth_and_predictions() {
        let n = 25;
        let x = Array2::zeros((n, 3));
        let y = Array1::zeros(n);

        let metrics = evaluate(&Constant(0.0), &x, &y).unwrap();
        assert_eq!(metrics.confusion.true_positives, 0);
        assert_eq!(metrics.confusion.false_positives, 0);
        assert_eq!(metrics.confusion.false_negatives, 0);
        assert_eq!(metrics.confusion.true_negatives, n);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1_score, 0.0);
        assert_eq!(metrics.accuracy, 1.0);
        assert_eq!(metrics.support(), n);
        assert_eq!(metrics.fraud_support(), 0);
    }

    #[test]
    fn test_no_fraud_in_truth() {
        let y_true = array![0.0, 0.0, 0.0];
        let y_pred = array![0.0, 1.0, 0.0];
        let metrics = Metrics::from_confusion(ConfusionMatrix::from_labels(&y_true, &y_pred).unwrap());
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1_score, 0.0);
    }

    #[test]
    fn test_empty_and_mismatched() {
        let empty = Array1::<f64>::zeros(0);
        let metrics = Metrics::from_confusion(ConfusionMatrix::from_labels(&empty, &empty).unwrap());
        assert_eq!(metrics.accuracy, 0.0);
        assert_eq!(metrics.support(), 0);

        assert!(matches!(
            ConfusionMatrix::from_labels(&array![1.0, 0.0], &array![1.0]),
            Err(PipelineError::ShapeError { .. })
        ));
        assert!(evaluate(&Constant(1.0), &Array2::zeros((3, 1)), &array![1.0]).is_err());
    }

    #[test]
    fn test_perfect_model() {
        let x = Array2::zeros((4, 1));
        let y = array![1.0, 1.0, 1.0, 1.0];
        let metrics = evaluate(&Constant(0.9), &x, &y).unwrap();
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.f1_score, 1.0);
    }
}
