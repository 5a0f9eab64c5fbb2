//! Weighted binary decision tree
//!
//! Splits minimise sample-weighted Gini impurity and leaves store the
//! weighted share of the fraud class, so each tree is a probability
//! estimator rather than a hard voter.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Nodes with at least this many rows scan candidate features in parallel
const PARALLEL_SCAN_MIN_ROWS: usize = 4096;

/// Gains below this are treated as no improvement
const MIN_GAIN: f64 = 1e-12;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with the weighted fraud probability
    Leaf {
        proba: f64,
        n_samples: usize,
    },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Weighted class mass of a set of rows
#[derive(Debug, Clone, Copy, Default)]
struct ClassMass {
    normal: f64,
    fraud: f64,
}

impl ClassMass {
    fn add(&mut self, label: f64, weight: f64) {
        if label > 0.5 {
            self.fraud += weight;
        } else {
            self.normal += weight;
        }
    }

    fn minus(self, other: ClassMass) -> ClassMass {
        ClassMass {
            normal: (self.normal - other.normal).max(0.0),
            fraud: (self.fraud - other.fraud).max(0.0),
        }
    }

    fn total(&self) -> f64 {
        self.normal + self.fraud
    }

    fn gini(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        let p = self.fraud / total;
        2.0 * p * (1.0 - p)
    }

    fn proba(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            0.0
        } else {
            self.fraud / total
        }
    }

    fn is_pure(&self) -> bool {
        self.normal <= 0.0 || self.fraud <= 0.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Borrowed training data shared by every node of one fit
struct FitData<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    weights: &'a [f64],
}

/// Decision tree classifier
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
    /// Features sampled at each split, all when `None`
    pub max_features: Option<usize>,
    /// Number of features
    n_features: usize,
    /// Normalised impurity decrease per feature
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
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

    /// Set the number of features sampled per split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Fit with unit sample weights, considering every feature at each split
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let weights = vec![1.0; x.nrows()];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        self.fit_weighted(x, y, &weights, &mut rng)
    }

    /// Fit on rows with positive weight.
    ///
    /// A row's weight scales its contribution to impurity and to the leaf
    /// probability; zero-weight rows are ignored, which lets a bootstrap be
    /// expressed as per-row draw counts. Labels must be 0 or 1.
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        sample_weight: &[f64],
        rng: &mut ChaCha8Rng,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples != sample_weight.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("sample_weight length = {}", n_samples),
                actual: format!("sample_weight length = {}", sample_weight.len()),
            });
        }
        if n_features == 0 {
            return Err(PipelineError::DataError("no features to split on".to_string()));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(PipelineError::DataError("labels must be 0 or 1".to_string()));
        }
        if sample_weight.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(PipelineError::DataError(
                "sample weights must be finite and non-negative".to_string(),
            ));
        }

        let indices: Vec<usize> = (0..n_samples).filter(|&i| sample_weight[i] > 0.0).collect();
        if indices.is_empty() {
            return Err(PipelineError::InsufficientData(
                "no rows with positive weight".to_string(),
            ));
        }

        self.n_features = n_features;
        let data = FitData {
            x,
            y,
            weights: sample_weight,
        };

        let mut importances = vec![0.0; n_features];
        self.root = Some(self.build_node(&data, indices, 0, &mut importances, rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn mass(data: &FitData<'_>, indices: &[usize]) -> ClassMass {
        let mut mass = ClassMass::default();
        for &i in indices {
            mass.add(data.y[i], data.weights[i]);
        }
        mass
    }

    fn is_constant(data: &FitData<'_>, indices: &[usize], feature_idx: usize) -> bool {
        let first = data.x[[indices[0], feature_idx]];
        indices.iter().all(|&i| data.x[[i, feature_idx]] == first)
    }

    fn build_node(
        &self,
        data: &FitData<'_>,
        indices: Vec<usize>,
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let mass = Self::mass(data, &indices);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || mass.is_pure();

        if should_stop {
            return TreeNode::Leaf {
                proba: mass.proba(),
                n_samples,
            };
        }

        // Draw features in random order, skipping those constant in this node
        let n_candidates = self.max_features.unwrap_or(self.n_features).clamp(1, self.n_features);
        let features: Vec<usize> = sample(rng, self.n_features, self.n_features)
            .into_iter()
            .filter(|&f| !Self::is_constant(data, &indices, f))
            .take(n_candidates)
            .collect();

        let Some(best) = self.find_best_split(data, &indices, &features, mass) else {
            return TreeNode::Leaf {
                proba: mass.proba(),
                n_samples,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| data.x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += mass.total() * best.gain;

        let left = Box::new(self.build_node(data, left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_node(data, right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: mass.gini(),
        }
    }

    fn find_best_split(
        &self,
        data: &FitData<'_>,
        indices: &[usize],
        features: &[usize],
        parent: ClassMass,
    ) -> Option<Candidate> {
        let scan = |&feature_idx: &usize| self.scan_feature(data, indices, feature_idx, parent);

        let results: Vec<Option<Candidate>> = if indices.len() >= PARALLEL_SCAN_MIN_ROWS {
            features.par_iter().map(scan).collect()
        } else {
            features.iter().map(scan).collect()
        };

        // Ties keep the earliest sampled feature so fits are reproducible
        results.into_iter().flatten().fold(None, |best, candidate| match best {
            Some(b) if b.gain >= candidate.gain => Some(b),
            _ => Some(candidate),
        })
    }

    /// Sweep the sorted values of one feature, moving rows left one at a time
    fn scan_feature(
        &self,
        data: &FitData<'_>,
        indices: &[usize],
        feature_idx: usize,
        parent: ClassMass,
    ) -> Option<Candidate> {
        let n = indices.len();
        let mut order: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (data.x[[i, feature_idx]], i))
            .collect();
        order.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let parent_impurity = parent.gini();
        let parent_total = parent.total();
        let mut left = ClassMass::default();
        let mut best: Option<Candidate> = None;

        for k in 0..n - 1 {
            let (value, row) = order[k];
            left.add(data.y[row], data.weights[row]);

            let next = order[k + 1].0;
            if value == next {
                continue;
            }
            let n_left = k + 1;
            if n_left < self.min_samples_leaf {
                continue;
            }
            if n - n_left < self.min_samples_leaf {
                break;
            }

            let right = parent.minus(left);
            let child_impurity =
                (left.total() * left.gini() + right.total() * right.gini()) / parent_total;
            let gain = parent_impurity - child_impurity;

            if gain > best.map_or(MIN_GAIN, |b| b.gain) {
                let mut threshold = value / 2.0 + next / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = value;
                }
                best = Some(Candidate {
                    feature_idx,
                    threshold,
                    gain,
                });
            }
        }

        best
    }

    /// Fraud probability for one feature vector
    pub fn predict_proba_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if row.len() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", row.len()),
            });
        }

        let mut node = root;
        loop {
            match node {
                TreeNode::Leaf { proba, .. } => return Ok(*proba),
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature_idx] <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
            }
        }
    }

    /// Fraud probability for every row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_proba_row(row))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get tree depth
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}
