//! In-memory dataset and the ordered feature contract
//!
//! A [`Dataset`] is the read-only numeric view of a validated table:
//! a feature matrix whose columns follow [`FeatureNames`], plus 0/1 labels.

pub mod schema;
pub mod summary;

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub use schema::{AMOUNT_COLUMN, LABEL_COLUMN, TIME_COLUMN};
pub use summary::{summarize, ColumnStats, DatasetSummary};

/// Named feature values, as presented by a caller at prediction time
pub type FeatureMap = HashMap<String, f64>;

/// Ordered, duplicate-free list of feature names.
///
/// The order is part of a trained model's contract: position `i` of every
/// feature vector must hold the value named `self[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureNames(Vec<String>);

impl FeatureNames {
    /// Build from an ordered list; rejects empty lists and duplicates
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(PipelineError::FeatureMismatch(
                "feature name list is empty".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::FeatureMismatch(format!(
                    "duplicate feature name: {}",
                    name
                )));
            }
        }
        Ok(Self(names))
    }

    /// The 30 input columns of the card transaction schema
    pub fn standard() -> Self {
        Self(schema::feature_columns())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Position of a feature, if present
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    /// Re-project a keyed feature map into positional order.
    ///
    /// Every name must be present and no unknown names are accepted, so a
    /// caller cannot silently shift values between positions.
    pub fn project(&self, features: &FeatureMap) -> Result<Array1<f64>> {
        let missing: Vec<&str> = self
            .0
            .iter()
            .filter(|name| !features.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::FeatureMismatch(format!(
                "missing features: {}",
                missing.join(", ")
            )));
        }

        if features.len() != self.0.len() {
            let mut unknown: Vec<&str> = features
                .keys()
                .filter(|k| self.index_of(k).is_none())
                .map(String::as_str)
                .collect();
            unknown.sort_unstable();
            return Err(PipelineError::FeatureMismatch(format!(
                "unknown features: {}",
                unknown.join(", ")
            )));
        }

        Ok(self.0.iter().map(|name| features[name.as_str()]).collect())
    }

    /// Fail unless a positional vector has exactly one value per feature
    pub fn check_len(&self, n: usize) -> Result<()> {
        if n != self.0.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.0.len()),
                actual: format!("{} features", n),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for FeatureNames {
    type Error = PipelineError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<FeatureNames> for Vec<String> {
    fn from(names: FeatureNames) -> Self {
        names.0
    }
}

/// Label counts of a dataset or partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassCounts {
    pub normal: usize,
    pub fraud: usize,
}

impl ClassCounts {
    /// Count 0/1 labels; anything above 0.5 counts as fraud
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a f64>) -> Self {
        labels.into_iter().fold(Self::default(), |mut acc, &y| {
            if y > 0.5 {
                acc.fraud += 1;
            } else {
                acc.normal += 1;
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.normal + self.fraud
    }

    /// Fraction of fraud rows; 0.0 for an empty set
    pub fn fraud_ratio(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.fraud as f64 / self.total() as f64
        }
    }
}

/// Numeric dataset: features in [`FeatureNames`] order plus 0/1 labels
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Array1<f64>,
    feature_names: FeatureNames,
}

impl Dataset {
    /// Create a dataset, checking shapes and that every label is 0 or 1
    pub fn new(features: Array2<f64>, labels: Array1<f64>, feature_names: FeatureNames) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", features.nrows()),
                actual: format!("{} labels", labels.len()),
            });
        }
        feature_names.check_len(features.ncols())?;
        if let Some(bad) = labels.iter().find(|&&y| y != 0.0 && y != 1.0) {
            return Err(PipelineError::DataError(format!(
                "label values must be 0 or 1, found {}",
                bad
            )));
        }
        Ok(Self {
            features,
            labels,
            feature_names,
        })
    }

    /// Extract the standard feature columns and label from a loaded table.
    ///
    /// Columns are cast to `Float64`; extra columns are ignored and nulls
    /// are rejected.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let feature_names = FeatureNames::standard();
        let n_rows = df.height();
        let mut features = Array2::<f64>::zeros((n_rows, feature_names.len()));

        for (j, name) in feature_names.iter().enumerate() {
            let values = column_as_f64(df, name)?;
            for (i, v) in values.into_iter().enumerate() {
                features[[i, j]] = v;
            }
        }

        let labels = Array1::from_vec(column_as_f64(df, LABEL_COLUMN)?);
        Self::new(features, labels, feature_names)
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    pub fn feature_names(&self) -> &FeatureNames {
        &self.feature_names
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn class_counts(&self) -> ClassCounts {
        ClassCounts::from_labels(self.labels.iter())
    }

    /// Copy the given rows into a new dataset
    pub(crate) fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }
}

/// Integer or floating point dtype
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Read a column as `f64`, failing on absence or nulls
pub(crate) fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::FeatureMismatch(format!("column not found: {}", name)))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;

    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                PipelineError::DataError(format!("null value in column {} at row {}", name, row))
            })
        })
        .collect()
}
