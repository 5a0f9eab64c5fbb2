//! Model training module
//!
//! Provides the class-weighted random forest used for fraud scoring:
//! - Weighted-Gini decision trees with per-node feature subsampling
//! - Parallel, seed-deterministic forest construction
//! - The [`Classifier`] trait consumed by evaluation and inference

mod config;
mod models;
pub mod decision_tree;
pub mod random_forest;

pub use config::{ClassWeighting, MaxFeatures, TrainingConfig};
pub use decision_tree::{DecisionTree, TreeNode};
pub use models::{label_for, Classifier, DECISION_THRESHOLD};
pub use random_forest::RandomForest;

use crate::error::Result;
use crate::utils::Timer;
use ndarray::{Array1, Array2};
use tracing::info;

/// Fit a random forest on scaled training features and 0/1 labels
pub fn train(x: &Array2<f64>, y: &Array1<f64>, config: &TrainingConfig) -> Result<RandomForest> {
    let timer = Timer::start();
    info!(
        n_samples = x.nrows(),
        n_features = x.ncols(),
        n_estimators = config.n_estimators,
        max_depth = ?config.max_depth,
        class_weighting = ?config.class_weighting,
        seed = config.seed,
        "Training random forest"
    );

    let mut forest = RandomForest::new(config.clone());
    forest.fit(x, y)?;

    let [normal_weight, fraud_weight] = forest.class_weights();
    info!(
        n_trees = forest.n_trees(),
        normal_weight,
        fraud_weight,
        elapsed_ms = timer.elapsed_ms(),
        "Random forest trained"
    );
    Ok(forest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_uses_config() {
        let y = Array1::from_shape_fn(60, |i| if i % 6 == 0 { 1.0 } else { 0.0 });
        let x = Array2::from_shape_fn((60, 3), |(i, j)| if j == 2 { y[i] * 5.0 } else { (i % 4) as f64 });
        let config = TrainingConfig::default()
            .with_n_estimators(5)
            .with_min_samples_split(2)
            .with_min_samples_leaf(1)
            .with_max_features(MaxFeatures::All);

        let forest = train(&x, &y, &config).unwrap();
        assert_eq!(forest.n_trees(), 5);
        assert_eq!(forest.config(), &config);

        let labels = forest.predict(&x).unwrap();
        assert_eq!(labels, y);
    }
}
