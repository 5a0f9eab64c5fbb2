//! Validation thresholds

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Thresholds for the advisory (warning-only) checks.
///
/// The defaults describe the public card-fraud export: ~150 MB on disk,
/// ~285k rows, fraud between 0.1% and 0.5%.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Files smaller than this are flagged as possibly truncated
    pub min_file_bytes: u64,
    /// Inclusive band of acceptable fraud fraction
    pub fraud_rate_band: (f64, f64),
    /// Minimum rows of each class before a warning
    pub min_class_count: usize,
    /// Minimum total rows before a warning
    pub min_total_rows: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_file_bytes: 100 * 1024 * 1024,
            fraud_rate_band: (0.001, 0.005),
            min_class_count: 100,
            min_total_rows: 100_000,
        }
    }
}

impl ValidationPolicy {
    /// Create a policy with default thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the minimum expected file size
    pub fn with_min_file_bytes(mut self, bytes: u64) -> Self {
        self.min_file_bytes = bytes;
        self
    }

    /// Builder method to set the expected fraud fraction band
    pub fn with_fraud_rate_band(mut self, min: f64, max: f64) -> Self {
        self.fraud_rate_band = (min, max);
        self
    }

    /// Builder method to set the per-class minimum
    pub fn with_min_class_count(mut self, count: usize) -> Self {
        self.min_class_count = count;
        self
    }

    /// Builder method to set the minimum total row count
    pub fn with_min_total_rows(mut self, rows: usize) -> Self {
        self.min_total_rows = rows;
        self
    }

    /// Check the thresholds are coherent
    pub fn check(&self) -> Result<()> {
        let (min, max) = self.fraud_rate_band;
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
            return Err(PipelineError::invalid_parameter(
                "fraud_rate_band",
                format!("({}, {})", min, max),
                "bounds must lie in [0, 1] with min <= max",
            ));
        }
        Ok(())
    }
}
