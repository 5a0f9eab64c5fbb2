//! Persisted units of a training run

use crate::dataset::{ClassCounts, FeatureNames};
use crate::error::{PipelineError, Result};
use crate::evaluation::Metrics;
use crate::preprocessing::SplitConfig;
use crate::training::{ClassWeighting, RandomForest, TrainingConfig};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one training run: `YYYYMMDDTHHMMSSZ-xxxxxxxx`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// New id from the current UTC time and a random suffix
    pub fn generate() -> Self {
        Self::at(Utc::now())
    }

    /// New id for a given timestamp; the suffix is still random
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", timestamp.format("%Y%m%dT%H%M%SZ"), &suffix[..8]))
    }

    /// Accept an existing id, rejecting anything that is not a plain
    /// directory name
    pub fn parse(s: &str) -> Result<Self> {
        let valid = !s.is_empty()
            && !s.starts_with('.')
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PipelineError::ArtifactError(format!("invalid run id: {:?}", s)));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trained forest together with the column order it expects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    feature_names: FeatureNames,
    forest: RandomForest,
}

impl ModelArtifact {
    pub fn new(feature_names: FeatureNames, forest: RandomForest) -> Result<Self> {
        if !forest.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        if forest.n_features() != feature_names.len() {
            return Err(PipelineError::FeatureMismatch(format!(
                "forest expects {} features but {} names were given",
                forest.n_features(),
                feature_names.len()
            )));
        }
        Ok(Self {
            feature_names,
            forest,
        })
    }

    pub fn feature_names(&self) -> &FeatureNames {
        &self.feature_names
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }
}

/// Importance of one named feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Descriptive record of a training run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    run_id: RunId,
    created_at: DateTime<Utc>,
    crate_version: String,
    model_type: String,
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    class_weighting: ClassWeighting,
    seed: u64,
    test_fraction: f64,
    split_seed: u64,
    training_samples: usize,
    test_samples: usize,
    training_fraud_samples: usize,
    test_fraud_samples: usize,
    feature_count: usize,
    training_time_ms: u64,
    metrics: Metrics,
    feature_importances: Vec<FeatureImportance>,
    validation_warnings: Vec<String>,
}

impl RunMetadata {
    pub fn new(
        run_id: RunId,
        training: &TrainingConfig,
        split: &SplitConfig,
        train_counts: ClassCounts,
        test_counts: ClassCounts,
        metrics: Metrics,
    ) -> Self {
        Self {
            run_id,
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            model_type: "RandomForestClassifier".to_string(),
            n_estimators: training.n_estimators,
            max_depth: training.max_depth,
            min_samples_split: training.min_samples_split,
            min_samples_leaf: training.min_samples_leaf,
            class_weighting: training.class_weighting,
            seed: training.seed,
            test_fraction: split.test_fraction,
            split_seed: split.seed,
            training_samples: train_counts.total(),
            test_samples: test_counts.total(),
            training_fraud_samples: train_counts.fraud,
            test_fraud_samples: test_counts.fraud,
            feature_count: 0,
            training_time_ms: 0,
            metrics,
            feature_importances: Vec::new(),
            validation_warnings: Vec::new(),
        }
    }

    /// Pair importances with their feature names, in feature order
    pub fn with_feature_importances(
        mut self,
        names: &FeatureNames,
        importances: &Array1<f64>,
    ) -> Result<Self> {
        names.check_len(importances.len())?;
        self.feature_count = names.len();
        self.feature_importances = names
            .iter()
            .zip(importances.iter())
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        Ok(self)
    }

    pub fn with_validation_warnings(mut self, warnings: Vec<String>) -> Self {
        self.validation_warnings = warnings;
        self
    }

    pub fn with_training_time_ms(mut self, ms: u64) -> Self {
        self.training_time_ms = ms;
        self
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn crate_version(&self) -> &str {
        &self.crate_version
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    pub fn class_weighting(&self) -> ClassWeighting {
        self.class_weighting
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    pub fn split_seed(&self) -> u64 {
        self.split_seed
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    pub fn test_samples(&self) -> usize {
        self.test_samples
    }

    pub fn training_fraud_samples(&self) -> usize {
        self.training_fraud_samples
    }

    pub fn test_fraud_samples(&self) -> usize {
        self.test_fraud_samples
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn training_time_ms(&self) -> u64 {
        self.training_time_ms
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn feature_importances(&self) -> &[FeatureImportance] {
        &self.feature_importances
    }

    /// The `k` most important features, highest first
    pub fn top_features(&self, k: usize) -> Vec<&FeatureImportance> {
        let mut ranked: Vec<&FeatureImportance> = self.feature_importances.iter().collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked.truncate(k);
        ranked
    }

    pub fn validation_warnings(&self) -> &[String] {
        &self.validation_warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ConfusionMatrix;
    use ndarray::array;

    fn metadata() -> RunMetadata {
        let metrics = Metrics::from_confusion(ConfusionMatrix {
            true_positives: 8,
            true_negatives: 90,
            false_positives: 1,
            false_negatives: 1,
        });
        RunMetadata::new(
            RunId::parse("20240101T000000Z-abcdef01").unwrap(),
            &TrainingConfig::default(),
            &SplitConfig::default(),
            ClassCounts { normal: 360, fraud: 40 },
            ClassCounts { normal: 91, fraud: 9 },
            metrics,
        )
    }

    #[test]
    fn test_run_id_format() {
        let ts = DateTime::parse_from_rfc3339("2024-03-05T07:08:09Z")
            .unwrap()
            .with_timezone(&Utc);
        let id = RunId::at(ts);
        let (stamp, suffix) = id.as_str().split_once('-').unwrap();
        assert_eq!(stamp, "20240305T070809Z");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(RunId::parse(id.as_str()).is_ok());

        assert_ne!(RunId::at(ts), RunId::at(ts));
    }

    #[test]
    fn test_run_id_rejects_paths() {
        assert!(RunId::parse("").is_err());
        assert!(RunId::parse("../escape").is_err());
        assert!(RunId::parse(".staging-x").is_err());
        assert!(RunId::parse("a/b").is_err());
    }

    #[test]
    fn test_metadata_records_run() {
        let names = FeatureNames::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        let meta = metadata()
            .with_feature_importances(&names, &array![0.2, 0.5, 0.3])
            .unwrap()
            .with_validation_warnings(vec!["small file".into()]);

        assert_eq!(meta.training_samples(), 400);
        assert_eq!(meta.test_fraud_samples(), 9);
        assert_eq!(meta.feature_count(), 3);
        assert_eq!(meta.n_estimators(), 100);
        assert_eq!(meta.class_weighting(), ClassWeighting::Balanced);

        let top: Vec<&str> = meta.top_features(2).iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(top, vec!["b", "c"]);

        let json = serde_json::to_string(&meta).unwrap();
        let back: RunMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_importances_must_align() {
        let names = FeatureNames::new(vec!["a".into(), "b".into()]).unwrap();
        assert!(metadata().with_feature_importances(&names, &array![1.0]).is_err());
    }

    #[test]
    fn test_artifact_requires_fitted_forest() {
        let names = FeatureNames::new(vec!["a".into()]).unwrap();
        assert!(matches!(
            ModelArtifact::new(names, RandomForest::default()),
            Err(PipelineError::ModelNotFitted)
        ));
    }
}
