//! Exploration summary of a loaded table

use super::schema::{AMOUNT_COLUMN, LABEL_COLUMN, TIME_COLUMN};
use super::ClassCounts;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Descriptive statistics over the non-null, finite values of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub column: String,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n - 1)
    pub std: f64,
}

impl ColumnStats {
    /// `None` when the column has no usable values
    pub fn from_values(column: &str, mut values: Vec<f64>) -> Option<Self> {
        values.retain(|v| v.is_finite());
        if values.is_empty() {
            return None;
        }
        values.sort_unstable_by(f64::total_cmp);

        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        let median = if n % 2 == 0 {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        } else {
            values[n / 2]
        };

        Some(Self {
            column: column.to_string(),
            count: n,
            min: values[0],
            max: values[n - 1],
            mean,
            median,
            std,
        })
    }
}

/// Shape, missing values, class balance and `Time`/`Amount` statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_columns: usize,
    pub estimated_bytes: usize,
    /// Null count of every column, in table order
    pub null_counts: Vec<(String, usize)>,
    pub class_counts: Option<ClassCounts>,
    pub time: Option<ColumnStats>,
    pub amount: Option<ColumnStats>,
}

impl DatasetSummary {
    pub fn total_nulls(&self) -> usize {
        self.null_counts.iter().map(|(_, n)| n).sum()
    }
}

/// Summarise a table. Absent or non-numeric columns are left out.
pub fn summarize(df: &DataFrame) -> Result<DatasetSummary> {
    let null_counts = df
        .get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.null_count()))
        .collect();

    let class_counts = numeric_values(df, LABEL_COLUMN)?
        .map(|labels| ClassCounts::from_labels(labels.iter()));
    let time = numeric_values(df, TIME_COLUMN)?.and_then(|v| ColumnStats::from_values(TIME_COLUMN, v));
    let amount =
        numeric_values(df, AMOUNT_COLUMN)?.and_then(|v| ColumnStats::from_values(AMOUNT_COLUMN, v));

    Ok(DatasetSummary {
        n_rows: df.height(),
        n_columns: df.width(),
        estimated_bytes: df.estimated_size(),
        null_counts,
        class_counts,
        time,
        amount,
    })
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Option<Vec<f64>>> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    if !super::is_numeric_dtype(column.dtype()) {
        return Ok(None);
    }
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(Some(series.f64()?.into_iter().flatten().collect()))
}
