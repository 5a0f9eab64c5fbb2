//! Dataset validation
//!
//! Gatekeeper run before any training work. [`validate`] is a pure function
//! of the source and a [`ValidationPolicy`]: it runs every check and returns
//! one immutable [`ValidationReport`] listing all errors and warnings. Only a
//! missing or unparsable source stops the checks early, since there is no
//! table to inspect.
//!
//! Checks, in order:
//! 1. existence and file size
//! 2. loadability
//! 3. schema (column count, missing and extra columns)
//! 4. quality (nulls, duplicate rows, non-numeric columns)
//! 5. value ranges (`Time`/`Amount` non-negative, finite values, 0/1 labels)
//! 6. class distribution (fraud band, per-class and total minimums)

pub mod issues;
mod policy;
mod report;

pub use issues::{Check, ValidationIssue};
pub use policy::ValidationPolicy;
pub use report::ValidationReport;

use crate::dataset::schema::{self, AMOUNT_COLUMN, LABEL_COLUMN, N_COLUMNS, TIME_COLUMN};
use crate::dataset::{is_numeric_dtype, ClassCounts};
use crate::utils::DataLoader;
use polars::prelude::*;
use rayon::prelude::*;
use report::ReportBuilder;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Distinct invalid labels listed in a finding
const MAX_REPORTED_LABELS: usize = 10;

/// Validation report together with the table it was computed on
#[derive(Debug)]
pub struct Inspection {
    pub report: ValidationReport,
    /// Loaded table; `None` when the source was missing or unparsable
    pub table: Option<DataFrame>,
}

/// Validate a dataset file
pub fn validate(source: &Path, policy: &ValidationPolicy) -> ValidationReport {
    inspect(source, policy).report
}

/// Validate a dataset file and hand back the loaded table for reuse
pub fn inspect(source: &Path, policy: &ValidationPolicy) -> Inspection {
    let mut findings = ValidationReport::new(source.display().to_string());

    let size_bytes = match std::fs::metadata(source) {
        Ok(meta) => meta.len(),
        Err(_) => {
            findings.error(ValidationIssue::SourceMissing {
                path: source.display().to_string(),
            });
            return Inspection {
                report: findings.finish(),
                table: None,
            };
        }
    };
    findings.file_size(size_bytes);
    if size_bytes < policy.min_file_bytes {
        findings.warn(ValidationIssue::SmallFile {
            size_bytes,
            expected_bytes: policy.min_file_bytes,
        });
    }

    let df = match DataLoader::new().load_auto(source) {
        Ok(df) => df,
        Err(e) => {
            findings.error(ValidationIssue::LoadFailed {
                reason: e.to_string(),
            });
            return Inspection {
                report: findings.finish(),
                table: None,
            };
        }
    };

    check_table(&df, policy, &mut findings);
    let report = findings.finish();

    info!(
        source = %source.display(),
        rows = report.n_rows(),
        errors = report.errors().len(),
        warnings = report.warnings().len(),
        "Dataset validation finished"
    );

    Inspection {
        report,
        table: Some(df),
    }
}

/// Validate an already loaded table (checks 3 to 6)
pub fn validate_frame(df: &DataFrame, policy: &ValidationPolicy) -> ValidationReport {
    let mut findings = ValidationReport::new("<in-memory>".to_string());
    check_table(df, policy, &mut findings);
    findings.finish()
}

/// A column that could be read as `f64`
struct NumericColumn {
    name: String,
    values: Vec<Option<f64>>,
}

fn check_table(df: &DataFrame, policy: &ValidationPolicy, findings: &mut ReportBuilder) {
    findings.shape(df.height(), df.width());
    check_schema(df, findings);
    let numeric = check_quality(df, findings);
    check_ranges(&numeric, findings);
    check_distribution(df.height(), &numeric, policy, findings);
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

fn check_schema(df: &DataFrame, findings: &mut ReportBuilder) {
    let actual = column_names(df);
    let expected = schema::expected_columns();

    if actual.len() != N_COLUMNS {
        findings.error(ValidationIssue::ColumnCount {
            expected: N_COLUMNS,
            found: actual.len(),
        });
    }

    let actual_set: HashSet<&str> = actual.iter().map(String::as_str).collect();
    let expected_set: HashSet<&str> = expected.iter().map(String::as_str).collect();

    let missing: Vec<String> = expected
        .iter()
        .filter(|c| !actual_set.contains(c.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        findings.error(ValidationIssue::MissingColumns { columns: missing });
    }

    let extra: Vec<String> = actual
        .iter()
        .filter(|c| !expected_set.contains(c.as_str()))
        .cloned()
        .collect();
    if !extra.is_empty() {
        findings.warn(ValidationIssue::ExtraColumns { columns: extra });
    }
}

/// Nulls, duplicates and dtypes. Returns the numeric columns for later checks.
fn check_quality(df: &DataFrame, findings: &mut ReportBuilder) -> Vec<NumericColumn> {
    let mut numeric = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let name = column.name().to_string();

        let nulls = column.null_count();
        if nulls > 0 {
            findings.error(ValidationIssue::NullValues {
                column: name.clone(),
                count: nulls,
            });
        }

        let dtype = column.dtype();
        let values = if is_numeric_dtype(dtype) {
            column
                .as_materialized_series()
                .cast(&DataType::Float64)
                .ok()
                .and_then(|s| s.f64().ok().map(|ca| ca.into_iter().collect::<Vec<_>>()))
        } else {
            None
        };

        match values {
            Some(values) => numeric.push(NumericColumn { name, values }),
            None => findings.error(ValidationIssue::NonNumeric {
                column: name,
                dtype: dtype.to_string(),
            }),
        }
    }

    let duplicates = count_duplicate_rows(&numeric, df.height());
    if duplicates > 0 {
        findings.warn(ValidationIssue::DuplicateRows { count: duplicates });
    }

    numeric
}

/// Bit pattern used for row equality; folds -0.0 into 0.0
fn cell_key(v: Option<f64>) -> Option<u64> {
    v.map(|x| if x == 0.0 { 0 } else { x.to_bits() })
}

fn row_cmp(columns: &[NumericColumn], a: usize, b: usize) -> Ordering {
    columns
        .iter()
        .map(|c| cell_key(c.values[a]).cmp(&cell_key(c.values[b])))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Rows identical to an earlier row across all numeric columns
fn count_duplicate_rows(columns: &[NumericColumn], n_rows: usize) -> usize {
    if columns.is_empty() || n_rows < 2 {
        return 0;
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    order.par_sort_unstable_by(|&a, &b| row_cmp(columns, a, b));

    order
        .windows(2)
        .filter(|w| row_cmp(columns, w[0], w[1]).is_eq())
        .count()
}

fn find<'a>(columns: &'a [NumericColumn], name: &str) -> Option<&'a NumericColumn> {
    columns.iter().find(|c| c.name == name)
}

fn check_ranges(columns: &[NumericColumn], findings: &mut ReportBuilder) {
    for name in [TIME_COLUMN, AMOUNT_COLUMN] {
        let Some(column) = find(columns, name) else {
            continue;
        };
        let negatives: Vec<f64> = column
            .values
            .iter()
            .flatten()
            .copied()
            .filter(|&v| v < 0.0)
            .collect();
        if !negatives.is_empty() {
            let min = negatives.iter().copied().fold(f64::INFINITY, f64::min);
            findings.error(ValidationIssue::NegativeValues {
                column: name.to_string(),
                count: negatives.len(),
                min,
            });
        }
    }

    for column in columns {
        let count = column
            .values
            .iter()
            .flatten()
            .filter(|v| !v.is_finite())
            .count();
        if count > 0 {
            findings.error(ValidationIssue::NonFinite {
                column: column.name.clone(),
                count,
            });
        }
    }

    if let Some(labels) = find(columns, LABEL_COLUMN) {
        let mut invalid: Vec<f64> = labels
            .values
            .iter()
            .flatten()
            .copied()
            .filter(|&v| v != 0.0 && v != 1.0)
            .collect();
        if !invalid.is_empty() {
            invalid.sort_by(f64::total_cmp);
            invalid.dedup_by(|a, b| a.to_bits() == b.to_bits());
            invalid.truncate(MAX_REPORTED_LABELS);
            findings.error(ValidationIssue::InvalidLabels { values: invalid });
        }
    }
}

fn check_distribution(
    n_rows: usize,
    columns: &[NumericColumn],
    policy: &ValidationPolicy,
    findings: &mut ReportBuilder,
) {
    let Some(labels) = find(columns, LABEL_COLUMN) else {
        return;
    };

    let counts = labels
        .values
        .iter()
        .fold(ClassCounts::default(), |mut acc, v| {
            match v {
                Some(x) if *x == 0.0 => acc.normal += 1,
                Some(x) if *x == 1.0 => acc.fraud += 1,
                _ => {}
            }
            acc
        });
    findings.class_counts(counts);

    if n_rows > 0 {
        let rate = counts.fraud as f64 / n_rows as f64;
        let (min, max) = policy.fraud_rate_band;
        if rate < min || rate > max {
            findings.warn(ValidationIssue::FraudRateOutOfBand { rate, min, max });
        }
    }

    for (class, count) in [(1u8, counts.fraud), (0u8, counts.normal)] {
        if count < policy.min_class_count {
            findings.warn(ValidationIssue::FewClassSamples {
                class,
                count,
                minimum: policy.min_class_count,
            });
        }
    }

    if n_rows < policy.min_total_rows {
        findings.warn(ValidationIssue::FewRows {
            count: n_rows,
            minimum: policy.min_total_rows,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clean frame with `n_rows` rows, one fraud every `fraud_every` rows
    fn clean_frame(n_rows: usize, fraud_every: usize) -> DataFrame {
        let columns: Vec<Column> = schema::expected_columns()
            .into_iter()
            .map(|name| {
                let values: Vec<f64> = (0..n_rows)
                    .map(|i| match name.as_str() {
                        "Time" => i as f64,
                        "Amount" => (i % 50) as f64 + 0.5,
                        "Class" => {
                            if i % fraud_every == 0 {
                                1.0
                            } else {
                                0.0
                            }
                        }
                        _ => ((i * 7) % 13) as f64 - 6.0,
                    })
                    .collect();
                Column::new(name.as_str().into(), values)
            })
            .collect();
        DataFrame::new(columns).unwrap()
    }

    fn lenient() -> ValidationPolicy {
        ValidationPolicy::new()
            .with_min_class_count(1)
            .with_min_total_rows(1)
            .with_fraud_rate_band(0.0, 1.0)
    }

    fn replace(df: &DataFrame, name: &str, values: Vec<f64>) -> DataFrame {
        let mut df = df.clone();
        df.with_column(Column::new(name.into(), values)).unwrap();
        df
    }

    #[test]
    fn test_clean_frame_is_valid() {
        let report = validate_frame(&clean_frame(100, 10), &lenient());
        assert!(report.is_valid(), "{:?}", report.errors());
        assert!(report.warnings().is_empty(), "{:?}", report.warnings());
        let counts = report.class_counts().unwrap();
        assert_eq!(counts.fraud, 10);
        assert_eq!(counts.normal, 90);
    }

    #[test]
    fn test_missing_column_is_error() {
        let df = clean_frame(20, 5).drop("V3").unwrap();
        let report = validate_frame(&df, &lenient());
        assert!(!report.is_valid());
        assert!(report.errors().contains(&ValidationIssue::MissingColumns {
            columns: vec!["V3".to_string()]
        }));
        assert!(report.errors().contains(&ValidationIssue::ColumnCount {
            expected: 31,
            found: 30
        }));
    }

    #[test]
    fn test_extra_column_is_warning() {
        let mut df = clean_frame(20, 5);
        df.with_column(Column::new("note".into(), vec![1.0; 20])).unwrap();
        let report = validate_frame(&df, &lenient());
        assert!(report.warnings().contains(&ValidationIssue::ExtraColumns {
            columns: vec!["note".to_string()]
        }));
    }

    #[test]
    fn test_negative_amount_and_time() {
        let df = clean_frame(20, 5);
        let mut amounts: Vec<f64> = vec![1.0; 20];
        amounts[3] = -2.5;
        let mut times: Vec<f64> = (0..20).map(|i| i as f64).collect();
        times[0] = -1.0;
        let df = replace(&replace(&df, "Amount", amounts), "Time", times);

        let report = validate_frame(&df, &lenient());
        assert!(!report.is_valid());
        assert!(report.errors().iter().any(|e| matches!(e,
            ValidationIssue::NegativeValues { column, count: 1, min } if column == "Amount" && *min == -2.5)));
        assert!(report.errors().iter().any(|e| matches!(e,
            ValidationIssue::NegativeValues { column, .. } if column == "Time")));
    }

    #[test]
    fn test_non_finite_values() {
        let mut values = vec![0.5; 20];
        values[1] = f64::INFINITY;
        values[2] = f64::NAN;
        let df = replace(&clean_frame(20, 5), "V7", values);
        let report = validate_frame(&df, &lenient());
        assert!(report.errors().contains(&ValidationIssue::NonFinite {
            column: "V7".to_string(),
            count: 2
        }));
    }

    #[test]
    fn test_invalid_labels() {
        let mut labels = vec![0.0; 20];
        labels[0] = 2.0;
        labels[1] = 1.0;
        labels[2] = 2.0;
        labels[3] = -1.0;
        let df = replace(&clean_frame(20, 5), "Class", labels);
        let report = validate_frame(&df, &lenient());
        assert!(report.errors().contains(&ValidationIssue::InvalidLabels {
            values: vec![-1.0, 2.0]
        }));
    }

    #[test]
    fn test_nulls_and_non_numeric() {
        let mut df = clean_frame(4, 2);
        df.with_column(Column::new(
            "V1".into(),
            vec![Some(1.0), None, Some(2.0), Some(3.0)],
        ))
        .unwrap();
        df.with_column(Column::new("V2".into(), vec!["a", "b", "c", "d"]))
            .unwrap();

        let report = validate_frame(&df, &lenient());
        assert!(report.errors().contains(&ValidationIssue::NullValues {
            column: "V1".to_string(),
            count: 1
        }));
        assert!(report.errors().iter().any(|e| matches!(e,
            ValidationIssue::NonNumeric { column, .. } if column == "V2")));
    }

    #[test]
    fn test_duplicates_are_warnings() {
        let df = clean_frame(10, 5);
        let doubled = df.vstack(&df.head(Some(3))).unwrap();
        let report = validate_frame(&doubled, &lenient());
        assert!(report.is_valid());
        assert!(report
            .warnings()
            .contains(&ValidationIssue::DuplicateRows { count: 3 }));
    }

    #[test]
    fn test_distribution_warnings_do_not_block() {
        let report = validate_frame(&clean_frame(50, 2), &ValidationPolicy::default());
        assert!(report.is_valid());
        let kinds: Vec<Check> = report.warnings().iter().map(|w| w.check()).collect();
        assert!(kinds.iter().all(|k| *k == Check::Distribution));
        assert!(report
            .warnings()
            .iter()
            .any(|w| matches!(w, ValidationIssue::FraudRateOutOfBand { .. })));
        assert!(report
            .warnings()
            .iter()
            .any(|w| matches!(w, ValidationIssue::FewRows { count: 50, .. })));
    }

    #[test]
    fn test_missing_source_stops_early() {
        let report = validate(Path::new("/no/such/creditcard.csv"), &lenient());
        assert!(!report.is_valid());
        assert_eq!(report.errors().len(), 1);
        assert_eq!(report.errors()[0].check(), Check::Existence);
        assert!(report.class_counts().is_none());
    }
}
