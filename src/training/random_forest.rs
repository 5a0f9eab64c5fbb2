//! Random Forest implementation

use super::config::TrainingConfig;
use super::decision_tree::DecisionTree;
use crate::dataset::ClassCounts;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Random Forest classifier with class-weighted trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Hyperparameters used for the fit
    config: TrainingConfig,
    /// `[normal, fraud]` weights applied during the fit
    class_weights: [f64; 2],
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(TrainingConfig::default())
    }
}

impl RandomForest {
    /// Create an unfitted forest
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            trees: Vec::new(),
            config,
            class_weights: [1.0, 1.0],
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Fit the forest to training data.
    ///
    /// Tree `i` draws its bootstrap and feature subsets from a generator
    /// seeded with `seed + i`, so a fit is reproducible regardless of how
    /// rayon schedules the trees.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        self.config.check()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::DataError("labels must be 0 or 1".to_string()));
        }

        let counts = ClassCounts::from_labels(y.iter());
        if counts.fraud == 0 {
            return Err(PipelineError::InsufficientData(
                "training data has no fraud examples".to_string(),
            ));
        }
        if counts.normal == 0 {
            return Err(PipelineError::InsufficientData(
                "training data has no normal examples".to_string(),
            ));
        }

        let class_weights = self.config.class_weighting.weights(counts);
        let max_features = self.config.max_features.resolve(n_features);
        let config = &self.config;

        let trees: Vec<DecisionTree> = (0..config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = config.seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                // Bootstrap as per-row draw counts
                let mut weights: Vec<f64> = if config.bootstrap {
                    let mut draws = vec![0u32; n_samples];
                    for _ in 0..n_samples {
                        draws[rng.gen_range(0..n_samples)] += 1;
                    }
                    draws.into_iter().map(f64::from).collect()
                } else {
                    vec![1.0; n_samples]
                };
                for (w, &label) in weights.iter_mut().zip(y.iter()) {
                    *w *= class_weights[if label > 0.5 { 1 } else { 0 }];
                }

                let mut tree = DecisionTree::new()
                    .with_max_depth(config.max_depth)
                    .with_min_samples_split(config.min_samples_split)
                    .with_min_samples_leaf(config.min_samples_leaf)
                    .with_max_features(max_features);
                tree.fit_weighted(x, y, &weights, &mut rng)?;

                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.class_weights = class_weights;
        self.n_features = n_features;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

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

        // Normalize
        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Mean fraud probability across trees for one feature vector
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if row.len() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", row.len()),
            });
        }

        let mut sum = 0.0;
        for tree in &self.trees {
            sum += tree.predict_proba_row(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Mean fraud probability across trees for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }

        let scores = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| self.predict_proba_row(row))
            .collect::<Result<Vec<f64>>>()?;

        Ok(Array1::from_vec(scores))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// `[normal, fraud]` sample weights used during the fit
    pub fn class_weights(&self) -> [f64; 2] {
        self.class_weights
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}
