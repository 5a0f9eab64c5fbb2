//! Fixed input schema of the card transaction dataset
//!
//! 30 input columns (`Time`, `V1`..`V28`, `Amount`) followed by the binary
//! `Class` label.

/// Seconds elapsed since the first transaction in the capture
pub const TIME_COLUMN: &str = "Time";
/// Transaction amount, never negative
pub const AMOUNT_COLUMN: &str = "Amount";
/// Binary label, 1 = fraud
pub const LABEL_COLUMN: &str = "Class";

/// Number of anonymised PCA components (`V1`..`V28`)
pub const N_COMPONENTS: usize = 28;
/// Number of input feature columns
pub const N_FEATURES: usize = N_COMPONENTS + 2;
/// Number of columns in a well-formed file, label included
pub const N_COLUMNS: usize = N_FEATURES + 1;

/// Name of the `i`th PCA component (1-based)
pub fn component_name(i: usize) -> String {
    format!("V{}", i)
}

/// Input feature columns in training order
pub fn feature_columns() -> Vec<String> {
    let mut columns = Vec::with_capacity(N_FEATURES);
    columns.push(TIME_COLUMN.to_string());
    columns.extend((1..=N_COMPONENTS).map(component_name));
    columns.push(AMOUNT_COLUMN.to_string());
    columns
}

/// Every column a well-formed file carries, label last
pub fn expected_columns() -> Vec<String> {
    let mut columns = feature_columns();
    columns.push(LABEL_COLUMN.to_string());
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_order() {
        let columns = feature_columns();
        assert_eq!(columns.len(), N_FEATURES);
        assert_eq!(columns[0], "Time");
        assert_eq!(columns[1], "V1");
        assert_eq!(columns[28], "V28");
        assert_eq!(columns[29], "Amount");
    }

    #[test]
    fn test_expected_columns_end_with_label() {
        let columns = expected_columns();
        assert_eq!(columns.len(), N_COLUMNS);
        assert_eq!(columns.last().map(String::as_str), Some(LABEL_COLUMN));
    }
}
