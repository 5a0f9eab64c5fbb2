//! Serving boundary
//!
//! A [`Predictor`] is built only from a verified bundle. It accepts raw,
//! unscaled features keyed by name, re-projects them into the training
//! column order and applies the persisted `Amount` scaling before scoring,
//! so callers never handle positional vectors or scaling themselves.

use crate::dataset::{FeatureMap, FeatureNames};
use crate::error::{PipelineError, Result};
use crate::export::{load_bundle, resolve_latest, LoadedBundle, Manifest, RunId, RunMetadata};
use crate::preprocessing::ScalerState;
use crate::training::{RandomForest, DECISION_THRESHOLD};
use ndarray::ArrayView1;
use rayon::prelude::*;
use std::path::Path;

/// Scores transactions with a persisted model bundle
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: LoadedBundle,
}

impl Predictor {
    /// Load and verify a bundle directory
    pub fn load(bundle_dir: impl AsRef<Path>) -> Result<Self> {
        let bundle = load_bundle(bundle_dir)?;
        tracing::info!(
            run_id = %bundle.manifest.run_id,
            n_trees = bundle.model.forest().n_trees(),
            n_features = bundle.feature_names.len(),
            "Predictor loaded"
        );
        Ok(Self { bundle })
    }

    /// Load the bundle that `destination/LATEST` points at
    pub fn load_latest(destination: impl AsRef<Path>) -> Result<Self> {
        Self::load(resolve_latest(destination)?)
    }

    /// Fraud score in `[0, 1]` for one transaction's raw named features
    pub fn predict(&self, features: &FeatureMap) -> Result<f64> {
        let ordered = self.bundle.feature_names.project(features)?;
        self.score(ordered.view())
    }

    /// Fraud score for a raw feature vector already in training order
    pub fn predict_ordered(&self, features: &[f64]) -> Result<f64> {
        self.bundle.feature_names.check_len(features.len())?;
        self.score(ArrayView1::from(features))
    }

    /// Scores for many transactions, in input order
    pub fn predict_batch(&self, batch: &[FeatureMap]) -> Result<Vec<f64>> {
        batch.par_iter().map(|features| self.predict(features)).collect()
    }

    /// Whether the score exceeds the decision threshold
    pub fn is_fraud(&self, features: &FeatureMap) -> Result<bool> {
        Ok(self.predict(features)? > DECISION_THRESHOLD)
    }

    fn score(&self, raw: ArrayView1<f64>) -> Result<f64> {
        if let Some(i) = raw.iter().position(|v| !v.is_finite()) {
            return Err(PipelineError::DataError(format!(
                "feature {} is not finite",
                self.bundle.feature_names.as_slice()[i]
            )));
        }
        let scaled = self.bundle.scaler.apply_row(raw)?;
        self.bundle.model.forest().predict_proba_row(scaled.view())
    }

    pub fn feature_names(&self) -> &FeatureNames {
        &self.bundle.feature_names
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.bundle.scaler
    }

    pub fn forest(&self) -> &RandomForest {
        self.bundle.model.forest()
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.bundle.metadata
    }

    pub fn manifest(&self) -> &Manifest {
        &self.bundle.manifest
    }

    pub fn run_id(&self) -> &RunId {
        &self.bundle.manifest.run_id
    }

    /// Directory the bundle was loaded from
    pub fn path(&self) -> &Path {
        &self.bundle.path
    }
}
