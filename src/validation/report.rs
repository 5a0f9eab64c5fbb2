//! Immutable validation result

use super::issues::ValidationIssue;
use crate::dataset::ClassCounts;
use serde::{Deserialize, Serialize};

/// Outcome of validating one dataset.
///
/// Training may proceed iff [`is_valid`](Self::is_valid); warnings are
/// informational and never block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    source: String,
    file_size_bytes: Option<u64>,
    n_rows: usize,
    n_columns: usize,
    class_counts: Option<ClassCounts>,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub(super) fn new(source: String) -> ReportBuilder {
        ReportBuilder {
            report: Self {
                source,
                file_size_bytes: None,
                n_rows: 0,
                n_columns: 0,
                class_counts: None,
                errors: Vec::new(),
                warnings: Vec::new(),
            },
        }
    }

    /// True when no blocking error was found
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn file_size_bytes(&self) -> Option<u64> {
        self.file_size_bytes
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.n_columns
    }

    /// Label counts, when the label column could be read
    pub fn class_counts(&self) -> Option<ClassCounts> {
        self.class_counts
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

/// Accumulates findings for a single validation call
pub(super) struct ReportBuilder {
    report: ValidationReport,
}

impl ReportBuilder {
    pub(super) fn error(&mut self, issue: ValidationIssue) {
        tracing::debug!(check = %issue.check(), "{}", issue);
        self.report.errors.push(issue);
    }

    pub(super) fn warn(&mut self, issue: ValidationIssue) {
        tracing::warn!(check = %issue.check(), "{}", issue);
        self.report.warnings.push(issue);
    }

    pub(super) fn file_size(&mut self, bytes: u64) {
        self.report.file_size_bytes = Some(bytes);
    }

    pub(super) fn shape(&mut self, n_rows: usize, n_columns: usize) {
        self.report.n_rows = n_rows;
        self.report.n_columns = n_columns;
    }

    pub(super) fn class_counts(&mut self, counts: ClassCounts) {
        self.report.class_counts = Some(counts);
    }

    pub(super) fn finish(self) -> ValidationReport {
        self.report
    }
}
