//! Pipeline configuration

use crate::error::{PipelineError, Result};
use crate::preprocessing::SplitConfig;
use crate::training::TrainingConfig;
use crate::validation::ValidationPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for every stage of a training run.
///
/// Every field is defaulted, so a JSON file only needs the values it
/// changes, e.g. `{"training": {"n_estimators": 200}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub validation: ValidationPolicy,
    pub split: SplitConfig,
    pub training: TrainingConfig,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::DataError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.check()?;
        Ok(config)
    }

    /// Builder method to set the validation policy
    pub fn with_validation(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.split.test_fraction = fraction;
        self
    }

    /// Builder method to set the training configuration
    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    /// Use one seed for both the split and the forest
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.seed = seed;
        self.training.seed = seed;
        self
    }

    /// Reject settings no run could succeed with
    pub fn check(&self) -> Result<()> {
        self.validation.check()?;
        let f = self.split.test_fraction;
        if !(f > 0.0 && f < 1.0) {
            return Err(PipelineError::invalid_parameter(
                "test_fraction",
                f,
                "must be strictly between 0 and 1",
            ));
        }
        self.training.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"training": {{"n_estimators": 12}}, "validation": {{"min_total_rows": 10}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.training.n_estimators, 12);
        assert_eq!(config.training.max_depth, Some(10));
        assert_eq!(config.validation.min_total_rows, 10);
        assert_eq!(config.validation.fraud_rate_band, (0.001, 0.005));
        assert_eq!(config.split, SplitConfig::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"split": {{"test_fraction": 1.5}}}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(file.path()),
            Err(PipelineError::InvalidParameter { .. })
        ));

        assert!(PipelineConfig::from_json_file("/nonexistent/config.json").is_err());
    }

    #[test]
    fn test_seed_applies_to_split_and_training() {
        let config = PipelineConfig::new().with_seed(7).with_test_fraction(0.25);
        assert_eq!(config.split.seed, 7);
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.split.test_fraction, 0.25);
        assert!(config.check().is_ok());
    }
}
