//! Standard scaling of a single feature column
//!
//! Only the transaction amount is scaled; the PCA components are already
//! centred and `Time` is left as is. Fitting accepts a [`TrainPartition`]
//! and nothing else, so held-out rows can never contribute to the
//! statistics.

use super::split::TrainPartition;
use crate::dataset::AMOUNT_COLUMN;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Fitted parameters of a standard scaler: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    column: String,
    column_index: usize,
    mean: f64,
    /// Population standard deviation, or 1.0 for a constant column
    scale: f64,
    n_samples_seen: usize,
}

/// Fits the `Amount` column scaler
pub struct AmountScaler;

impl AmountScaler {
    /// Fit on the training partition's amounts
    pub fn fit(train: &TrainPartition) -> Result<ScalerState> {
        ScalerState::fit_column(train, AMOUNT_COLUMN)
    }
}

impl ScalerState {
    /// Fit a standard scaler on one named column of the training partition
    pub fn fit_column(train: &TrainPartition, column: &str) -> Result<Self> {
        let data = train.data();
        let column_index = data
            .feature_names()
            .index_of(column)
            .ok_or_else(|| PipelineError::FeatureMismatch(format!("column not found: {}", column)))?;

        let values = data.features().column(column_index);
        let n = values.len();
        if n == 0 {
            return Err(PipelineError::InsufficientData(
                "cannot fit a scaler on an empty partition".to_string(),
            ));
        }

        let mean = values.sum() / n as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let std = variance.sqrt();

        Ok(Self {
            column: column.to_string(),
            column_index,
            mean,
            scale: if std == 0.0 { 1.0 } else { std },
            n_samples_seen: n,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Position of the scaled column within a feature vector
    pub fn column_index(&self) -> usize {
        self.column_index
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    /// Scale raw column values. The input is left untouched.
    pub fn transform(&self, values: ArrayView1<f64>) -> Array1<f64> {
        values.mapv(|v| (v - self.mean) / self.scale)
    }

    /// Undo [`transform`](Self::transform)
    pub fn inverse_transform(&self, values: ArrayView1<f64>) -> Array1<f64> {
        values.mapv(|v| v * self.scale + self.mean)
    }

    /// Copy of a feature matrix with the fitted column scaled
    pub fn apply(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(features.ncols())?;
        let mut scaled = features.clone();
        scaled
            .column_mut(self.column_index)
            .mapv_inplace(|v| (v - self.mean) / self.scale);
        Ok(scaled)
    }

    /// Copy of one feature vector with the fitted column scaled
    pub fn apply_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        let mut scaled = row.to_owned();
        scaled[self.column_index] = (scaled[self.column_index] - self.mean) / self.scale;
        Ok(scaled)
    }

    fn check_width(&self, n_features: usize) -> Result<()> {
        if self.column_index >= n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("more than {} features", self.column_index),
                actual: format!("{} features", n_features),
            });
        }
        Ok(())
    }
}
