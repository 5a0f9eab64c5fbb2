//! Classifier trait shared by trees, forests and evaluation

use crate::error::Result;
use ndarray::{Array1, Array2};

/// Scores strictly above this are labelled fraud
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Binary classifier producing a fraud score in `[0, 1]`
pub trait Classifier: Send + Sync {
    /// Fraud probability per row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard 0/1 labels at [`DECISION_THRESHOLD`]
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(label_for))
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Map a fraud score to a 0/1 label
pub fn label_for(score: f64) -> f64 {
    if score > DECISION_THRESHOLD {
        1.0
    } else {
        0.0
    }
}

impl Classifier for super::DecisionTree {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        super::DecisionTree::predict_proba(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        super::DecisionTree::feature_importances(self).cloned()
    }
}

impl Classifier for super::RandomForest {
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        super::RandomForest::predict_proba(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        super::RandomForest::feature_importances(self).cloned()
    }
}
