//! Training configuration

use crate::dataset::ClassCounts;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Strategy for the number of features tried at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
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
    /// Resolve to a feature count in `1..=n_features`, rounding down
    /// (30 features under `Sqrt` try 5 per split)
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        n.clamp(1, n_features.max(1))
    }
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeighting {
    /// Every sample weighs 1
    None,
    /// Inverse class frequency: `n_samples / (2 * class_count)`
    Balanced,
}

impl ClassWeighting {
    /// Weights for `[normal, fraud]`. Both classes must be present.
    pub fn weights(&self, counts: ClassCounts) -> [f64; 2] {
        match self {
            ClassWeighting::None => [1.0, 1.0],
            ClassWeighting::Balanced => {
                let n = counts.total() as f64;
                [
                    n / (2.0 * counts.normal as f64),
                    n / (2.0 * counts.fraud as f64),
                ]
            }
        }
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each leaf
    pub min_samples_leaf: usize,
    /// Features considered per split
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    /// Sample weighting by class
    pub class_weighting: ClassWeighting,
    /// Base seed; tree `i` uses `seed + i`
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 10,
            min_samples_leaf: 5,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weighting: ClassWeighting::Balanced,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Builder method to set maximum depth (`None` grows until pure)
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Builder method to set minimum samples to split
    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    /// Builder method to set minimum samples per leaf
    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    /// Builder method to set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Builder method to set class weighting
    pub fn with_class_weighting(mut self, weighting: ClassWeighting) -> Self {
        self.class_weighting = weighting;
        self
    }

    /// Builder method to set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject hyperparameters that cannot train a forest
    pub fn check(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(PipelineError::invalid_parameter(
                "n_estimators",
                self.n_estimators,
                "at least one tree is required",
            ));
        }
        if self.max_depth == Some(0) {
            return Err(PipelineError::invalid_parameter("max_depth", 0, "must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::invalid_parameter(
                "min_samples_split",
                self.min_samples_split,
                "must be at least 2",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(PipelineError::invalid_parameter(
                "min_samples_leaf",
                0,
                "must be at least 1",
            ));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(PipelineError::invalid_parameter(
                    "max_features",
                    f,
                    "fraction must be in (0, 1]",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.n_estimators, 100);
        assert_eq!(config.max_depth, Some(10));
        assert_eq!(config.min_samples_split, 10);
        assert_eq!(config.min_samples_leaf, 5);
        assert_eq!(config.class_weighting, ClassWeighting::Balanced);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_balanced_weights_equalise_classes() {
        let counts = ClassCounts { normal: 998, fraud: 2 };
        let [w0, w1] = ClassWeighting::Balanced.weights(counts);
        assert!((w0 * 998.0 - w1 * 2.0).abs() < 1e-9);
        assert!((w0 * 998.0 + w1 * 2.0 - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(30), 5);
        assert_eq!(MaxFeatures::Sqrt.resolve(36), 6);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::Log2.resolve(30), 4);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(31), 15);
        assert_eq!(MaxFeatures::Fixed(100).resolve(30), 30);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(30), 1);
        assert_eq!(MaxFeatures::All.resolve(30), 30);
    }

    #[test]
    fn test_invalid_hyperparameters() {
        assert!(TrainingConfig::new().with_n_estimators(0).check().is_err());
        assert!(TrainingConfig::new().with_min_samples_split(1).check().is_err());
        assert!(TrainingConfig::new().with_min_samples_leaf(0).check().is_err());
        assert!(TrainingConfig::new().with_max_depth(Some(0)).check().is_err());
        assert!(TrainingConfig::new()
            .with_max_features(MaxFeatures::Fraction(1.5))
            .check()
            .is_err());
    }

    #[test]
    fn test_json_overrides() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"n_estimators": 10, "class_weighting": "none"}"#).unwrap();
        assert_eq!(config.n_estimators, 10);
        assert_eq!(config.class_weighting, ClassWeighting::None);
        assert_eq!(config.min_samples_leaf, 5);
    }
}
