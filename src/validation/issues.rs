//! Typed validation findings

use serde::{Deserialize, Serialize};
use std::fmt;

const MIB: f64 = 1024.0 * 1024.0;

/// The validation check that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Existence,
    Load,
    Schema,
    Quality,
    Range,
    Distribution,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Check::Existence => "existence",
            Check::Load => "load",
            Check::Schema => "schema",
            Check::Quality => "quality",
            Check::Range => "range",
            Check::Distribution => "distribution",
        };
        f.pad(name)
    }
}

/// A single validation finding.
///
/// Whether a finding blocks training is decided by the list of the
/// [`ValidationReport`](super::ValidationReport) it lands in, not by the
/// variant itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Source path does not exist or cannot be stat'ed
    SourceMissing { path: String },
    /// File is much smaller than a complete export
    SmallFile { size_bytes: u64, expected_bytes: u64 },
    /// Table could not be parsed
    LoadFailed { reason: String },
    /// Wrong number of columns
    ColumnCount { expected: usize, found: usize },
    /// Required columns absent
    MissingColumns { columns: Vec<String> },
    /// Columns outside the schema
    ExtraColumns { columns: Vec<String> },
    /// Column contains nulls
    NullValues { column: String, count: usize },
    /// Fully identical rows
    DuplicateRows { count: usize },
    /// Column is not numeric
    NonNumeric { column: String, dtype: String },
    /// Column must be non-negative
    NegativeValues { column: String, count: usize, min: f64 },
    /// NaN or infinite values
    NonFinite { column: String, count: usize },
    /// Labels outside {0, 1}
    InvalidLabels { values: Vec<f64> },
    /// Fraud fraction outside the expected band
    FraudRateOutOfBand { rate: f64, min: f64, max: f64 },
    /// Too few rows of one class
    FewClassSamples { class: u8, count: usize, minimum: usize },
    /// Too few rows overall
    FewRows { count: usize, minimum: usize },
}

impl ValidationIssue {
    /// Check that produced this finding
    pub fn check(&self) -> Check {
        use ValidationIssue::*;
        match self {
            SourceMissing { .. } | SmallFile { .. } => Check::Existence,
            LoadFailed { .. } => Check::Load,
            ColumnCount { .. } | MissingColumns { .. } | ExtraColumns { .. } => Check::Schema,
            NullValues { .. } | DuplicateRows { .. } | NonNumeric { .. } => Check::Quality,
            NegativeValues { .. } | NonFinite { .. } | InvalidLabels { .. } => Check::Range,
            FraudRateOutOfBand { .. } | FewClassSamples { .. } | FewRows { .. } => {
                Check::Distribution
            }
        }
    }

    /// Offending column, where the finding concerns a single one
    pub fn column(&self) -> Option<&str> {
        use ValidationIssue::*;
        match self {
            NullValues { column, .. }
            | NonNumeric { column, .. }
            | NegativeValues { column, .. }
            | NonFinite { column, .. } => Some(column),
            InvalidLabels { .. } | FraudRateOutOfBand { .. } | FewClassSamples { .. } => {
                Some(crate::dataset::LABEL_COLUMN)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ValidationIssue::*;
        match self {
            SourceMissing { path } => write!(f, "Dataset file not found: {}", path),
            SmallFile { size_bytes, expected_bytes } => write!(
                f,
                "File size ({:.2} MB) is below the expected {:.2} MB, the file may be truncated",
                *size_bytes as f64 / MIB,
                *expected_bytes as f64 / MIB
            ),
            LoadFailed { reason } => write!(f, "Failed to load dataset: {}", reason),
            ColumnCount { expected, found } => {
                write!(f, "Expected {} columns, found {}", expected, found)
            }
            MissingColumns { columns } => write!(f, "Missing columns: {}", columns.join(", ")),
            ExtraColumns { columns } => write!(f, "Extra columns found: {}", columns.join(", ")),
            NullValues { column, count } => {
                write!(f, "Column {} has {} missing values", column, count)
            }
            DuplicateRows { count } => write!(f, "Found {} duplicate rows", count),
            NonNumeric { column, dtype } => {
                write!(f, "Column {} is {} (should be numeric)", column, dtype)
            }
            NegativeValues { column, count, min } => write!(
                f,
                "Column {} has {} negative values (min {})",
                column, count, min
            ),
            NonFinite { column, count } => {
                write!(f, "Column {} has {} NaN or infinite values", column, count)
            }
            InvalidLabels { values } => {
                let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(
                    f,
                    "{} must only contain 0 and 1, found: {}",
                    crate::dataset::LABEL_COLUMN,
                    shown.join(", ")
                )
            }
            FraudRateOutOfBand { rate, min, max } => write!(
                f,
                "Fraud percentage ({:.3}%) outside expected range ({:.3}%-{:.3}%)",
                rate * 100.0,
                min * 100.0,
                max * 100.0
            ),
            FewClassSamples { class, count, minimum } => write!(
                f,
                "Only {} samples of class {} (expected at least {})",
                count, class, minimum
            ),
            FewRows { count, minimum } => write!(
                f,
                "Only {} total samples (expected at least {})",
                count, minimum
            ),
        }
    }
}
