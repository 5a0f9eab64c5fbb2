//! Integration test: dataset validation against files on disk

mod common;

use common::{header, transactions, write_csv, write_dataset};
use fraud_pipeline::dataset::ClassCounts;
use fraud_pipeline::validation::{validate, Check, ValidationIssue, ValidationPolicy};
use tempfile::tempdir;

#[test]
fn test_clean_file_is_valid_with_exact_counts() {
    let dir = tempdir().unwrap();
    let path = write_dataset(dir.path(), "clean.csv", 1765, 3, 1);

    let report = validate(&path, &ValidationPolicy::default());

    assert!(report.is_valid(), "errors: {:?}", report.error_messages());
    assert_eq!(report.n_rows(), 1765);
    assert_eq!(report.n_columns(), 31);
    assert_eq!(report.class_counts(), Some(ClassCounts { normal: 1762, fraud: 3 }));
    assert!(report.file_size_bytes().unwrap() > 0);

    // A small extract trips the advisory checks only
    assert!(report
        .warnings()
        .iter()
        .any(|w| matches!(w, ValidationIssue::SmallFile { .. })));
    assert!(report
        .warnings()
        .iter()
        .any(|w| matches!(w, ValidationIssue::FewClassSamples { class: 1, count: 3, .. })));
    assert!(report
        .warnings()
        .iter()
        .any(|w| matches!(w, ValidationIssue::FewRows { count: 1765, .. })));
    assert!(!report
        .warnings()
        .iter()
        .any(|w| matches!(w, ValidationIssue::FraudRateOutOfBand { .. })));
}

#[test]
fn test_relaxed_policy_has_no_warnings() {
    let dir = tempdir().unwrap();
    let path = write_dataset(dir.path(), "clean.csv", 2000, 6, 2);
    let policy = ValidationPolicy::new()
        .with_min_file_bytes(0)
        .with_min_class_count(1)
        .with_min_total_rows(1);

    let report = validate(&path, &policy);
    assert!(report.is_valid());
    assert!(report.warnings().is_empty(), "{:?}", report.warning_messages());
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let report = validate(&dir.path().join("absent.csv"), &ValidationPolicy::default());

    assert!(!report.is_valid());
    assert_eq!(report.errors().len(), 1);
    assert_eq!(report.errors()[0].check(), Check::Existence);
    assert_eq!(report.n_rows(), 0);
}

#[test]
fn test_negative_amount_and_bad_label() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    let mut rows = transactions(500, 2, 3);
    rows[10][29] = -5.0;
    rows[20][30] = 2.0;
    write_csv(&path, &header(), &rows);

    let report = validate(&path, &ValidationPolicy::default());

    assert!(!report.is_valid());
    assert!(report.errors().iter().any(|e| matches!(
        e,
        ValidationIssue::NegativeValues { column, count: 1, .. } if column == "Amount"
    )));
    assert!(report
        .errors()
        .iter()
        .any(|e| matches!(e, ValidationIssue::InvalidLabels { values } if values == &vec![2.0])));
}

#[test]
fn test_missing_and_extra_columns() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("renamed.csv");
    let mut names = header();
    names[5] = "V99".to_string();
    write_csv(&path, &names, &transactions(300, 1, 4));

    let report = validate(&path, &ValidationPolicy::default());

    assert!(!report.is_valid());
    assert!(report.errors().iter().any(|e| matches!(
        e,
        ValidationIssue::MissingColumns { columns } if columns == &vec!["V5".to_string()]
    )));
    assert!(report.warnings().iter().any(|w| matches!(
        w,
        ValidationIssue::ExtraColumns { columns } if columns == &vec!["V99".to_string()]
    )));
}

#[test]
fn test_duplicate_rows_warn() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dupes.csv");
    let mut rows = transactions(400, 1, 5);
    let copy = rows[7].clone();
    rows.push(copy.clone());
    rows.push(copy);
    write_csv(&path, &header(), &rows);

    let report = validate(&path, &ValidationPolicy::default());

    assert!(report.is_valid());
    assert!(report
        .warnings()
        .iter()
        .any(|w| matches!(w, ValidationIssue::DuplicateRows { count: 2 })));
}

#[test]
fn test_report_serializes() {
    let dir = tempdir().unwrap();
    let path = write_dataset(dir.path(), "clean.csv", 300, 1, 6);
    let report = validate(&path, &ValidationPolicy::default());

    let json = serde_json::to_string(&report).unwrap();
    let back: fraud_pipeline::validation::ValidationReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}
