//! Structured record of one pipeline run

use crate::error::Result;
use crate::evaluation::Metrics;
use crate::export::RunId;
use crate::validation::ValidationReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Split,
    Scale,
    Train,
    Evaluate,
    Persist,
    Verify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Split => "split",
            Stage::Scale => "scale",
            Stage::Train => "train",
            Stage::Evaluate => "evaluate",
            Stage::Persist => "persist",
            Stage::Verify => "verify",
        };
        f.pad(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    pub elapsed_ms: u64,
    pub detail: String,
}

/// Score of one held-out row, computed through the reloaded bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleCheck {
    /// Row position in the source table
    pub source_row: usize,
    pub actual_fraud: bool,
    pub score: f64,
    pub predicted_fraud: bool,
}

impl SampleCheck {
    pub fn is_correct(&self) -> bool {
        self.actual_fraud == self.predicted_fraud
    }
}

/// Everything a run produced, serializable as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    source: String,
    started_at: DateTime<Utc>,
    stages: Vec<StageRecord>,
    validation: Option<ValidationReport>,
    metrics: Option<Metrics>,
    run_id: Option<RunId>,
    bundle_path: Option<PathBuf>,
    sample_checks: Vec<SampleCheck>,
}

impl RunReport {
    pub(crate) fn new(source: &Path) -> Self {
        Self {
            source: source.display().to_string(),
            started_at: Utc::now(),
            stages: Vec::new(),
            validation: None,
            metrics: None,
            run_id: None,
            bundle_path: None,
            sample_checks: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, record: StageRecord) {
        self.stages.push(record);
    }

    pub(crate) fn set_validation(&mut self, report: ValidationReport) {
        self.validation = Some(report);
    }

    pub(crate) fn set_metrics(&mut self, metrics: Metrics) {
        self.metrics = Some(metrics);
    }

    pub(crate) fn set_bundle(&mut self, run_id: RunId, path: PathBuf) {
        self.run_id = Some(run_id);
        self.bundle_path = Some(path);
    }

    pub(crate) fn push_sample_check(&mut self, check: SampleCheck) {
        self.sample_checks.push(check);
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn validation(&self) -> Option<&ValidationReport> {
        self.validation.as_ref()
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn bundle_path(&self) -> Option<&Path> {
        self.bundle_path.as_deref()
    }

    pub fn sample_checks(&self) -> &[SampleCheck] {
        &self.sample_checks
    }

    /// True when every recorded stage succeeded and a bundle was committed
    pub fn succeeded(&self) -> bool {
        self.bundle_path.is_some()
            && self.stages.iter().all(|r| r.status == StageStatus::Succeeded)
    }

    /// Total wall time across recorded stages
    pub fn total_elapsed_ms(&self) -> u64 {
        self.stages.iter().map(|r| r.elapsed_ms).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
