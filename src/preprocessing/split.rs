//! Stratified train/test split

use crate::dataset::{ClassCounts, Dataset};
use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Split configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of each class held out for evaluation
    pub test_fraction: f64,
    /// Seed for the shuffles
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Training partition. Only produced by [`stratified_split`].
#[derive(Debug, Clone)]
pub struct TrainPartition {
    data: Dataset,
    rows: Vec<usize>,
}

/// Held-out partition. Only produced by [`stratified_split`].
#[derive(Debug, Clone)]
pub struct TestPartition {
    data: Dataset,
    rows: Vec<usize>,
}

macro_rules! partition_accessors {
    ($ty:ty) => {
        impl $ty {
            pub fn data(&self) -> &Dataset {
                &self.data
            }

            /// Row positions in the source dataset, in partition order
            pub fn rows(&self) -> &[usize] {
                &self.rows
            }

            pub fn n_samples(&self) -> usize {
                self.data.n_samples()
            }

            pub fn class_counts(&self) -> ClassCounts {
                self.data.class_counts()
            }
        }
    };
}

partition_accessors!(TrainPartition);
partition_accessors!(TestPartition);

/// Split a dataset into train and test partitions, preserving the class ratio.
///
/// Each class is shuffled independently and `round(count * test_fraction)`
/// of its rows (at least one, and leaving at least one for training) go to
/// the test partition. The same seed always yields the same partitions.
///
/// Fails with [`PipelineError::InsufficientData`] when either class has
/// fewer than two rows, since it could not appear in both partitions.
pub fn stratified_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(TrainPartition, TestPartition)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::invalid_parameter(
            "test_fraction",
            test_fraction,
            "must be strictly between 0 and 1",
        ));
    }

    // BTreeMap keeps class iteration order fixed for reproducibility
    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::from([(0, Vec::new()), (1, Vec::new())]);
    for (i, &label) in dataset.labels().iter().enumerate() {
        let class = if label > 0.5 { 1 } else { 0 };
        by_class.entry(class).or_default().push(i);
    }

    for (class, rows) in &by_class {
        if rows.len() < 2 {
            return Err(PipelineError::InsufficientData(format!(
                "class {} has {} rows, at least 2 are needed to stratify into train and test",
                class,
                rows.len()
            )));
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_rows = Vec::with_capacity(dataset.n_samples());
    let mut test_rows = Vec::new();

    for rows in by_class.values_mut() {
        rows.shuffle(&mut rng);
        let n_test = ((rows.len() as f64 * test_fraction).round() as usize).clamp(1, rows.len() - 1);
        test_rows.extend_from_slice(&rows[..n_test]);
        train_rows.extend_from_slice(&rows[n_test..]);
    }

    train_rows.shuffle(&mut rng);
    test_rows.shuffle(&mut rng);

    let train = TrainPartition {
        data: dataset.select(&train_rows),
        rows: train_rows,
    };
    let test = TestPartition {
        data: dataset.select(&test_rows),
        rows: test_rows,
    };

    tracing::debug!(
        train = train.n_samples(),
        test = test.n_samples(),
        train_fraud = train.class_counts().fraud,
        test_fraud = test.class_counts().fraud,
        "Stratified split"
    );

    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::FeatureNames;
    use ndarray::{Array1, Array2};

    fn dataset(n: usize, fraud_every: usize) -> Dataset {
        let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * (j + 1)) as f64);
        let labels = Array1::from_shape_fn(n, |i| if i % fraud_every == 0 { 1.0 } else { 0.0 });
        let names = FeatureNames::new(vec!["a".into(), "b".into()]).unwrap();
        Dataset::new(features, labels, names).unwrap()
    }

    #[test]
    fn test_split_is_deterministic() {
        let data = dataset(1000, 20);
        let (train_a, test_a) = stratified_split(&data, 0.2, 42).unwrap();
        let (train_b, test_b) = stratified_split(&data, 0.2, 42).unwrap();
        assert_eq!(train_a.rows(), train_b.rows());
        assert_eq!(test_a.rows(), test_b.rows());

        let (_, test_c) = stratified_split(&data, 0.2, 7).unwrap();
        assert_ne!(test_a.rows(), test_c.rows());
    }

    #[test]
    fn test_split_preserves_ratio() {
        let data = dataset(1000, 20);
        let (train, test) = stratified_split(&data, 0.2, 42).unwrap();

        assert_eq!(train.n_samples() + test.n_samples(), 1000);
        assert_eq!(test.n_samples(), 200);
        let diff = (train.class_counts().fraud_ratio() - test.class_counts().fraud_ratio()).abs();
        assert!(diff < 1e-3, "ratio drift {}", diff);
    }

    #[test]
    fn test_partitions_are_disjoint_and_cover() {
        let data = dataset(101, 10);
        let (train, test) = stratified_split(&data, 0.3, 1).unwrap();
        let mut all: Vec<usize> = train.rows().iter().chain(test.rows()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..101).collect::<Vec<_>>());

        // Rows carry their source features
        let first = train.rows()[0];
        assert_eq!(train.data().features()[[0, 1]], (first * 2) as f64);
    }

    #[test]
    fn test_single_fraud_row_is_insufficient() {
        let data = dataset(50, 1000);
        let result = stratified_split(&data, 0.2, 42);
        assert!(matches!(result, Err(PipelineError::InsufficientData(_))));
    }

    #[test]
    fn test_tiny_class_lands_in_both_partitions() {
        let data = dataset(100, 50);
        let (train, test) = stratified_split(&data, 0.2, 42).unwrap();
        assert_eq!(train.class_counts().fraud, 1);
        assert_eq!(test.class_counts().fraud, 1);
    }

    #[test]
    fn test_invalid_fraction() {
        let data = dataset(100, 10);
        assert!(stratified_split(&data, 0.0, 42).is_err());
        assert!(stratified_split(&data, 1.0, 42).is_err());
        assert!(stratified_split(&data, f64::NAN, 42).is_err());
    }
}
