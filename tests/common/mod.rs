//! Synthetic card transaction files for integration tests

#![allow(dead_code)]

use fraud_pipeline::dataset::schema::{expected_columns, N_COMPONENTS};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::{Path, PathBuf};

/// Components shifted for fraud rows
pub const SIGNAL_COMPONENTS: usize = 10;

/// One transaction row in schema order, label last
pub fn transaction(rng: &mut ChaCha8Rng, index: usize, fraud: bool) -> Vec<f64> {
    let mut row = Vec::with_capacity(N_COMPONENTS + 3);
    row.push(index as f64 * 2.5);
    for c in 0..N_COMPONENTS {
        let noise: f64 = rng.gen_range(-1.0..1.0);
        let shift = if fraud && c < SIGNAL_COMPONENTS { 4.0 } else { 0.0 };
        row.push(noise + shift);
    }
    let amount: f64 = if fraud {
        rng.gen_range(300.0..900.0)
    } else {
        rng.gen_range(0.0..250.0)
    };
    row.push((amount * 100.0).round() / 100.0);
    row.push(if fraud { 1.0 } else { 0.0 });
    row
}

/// `n_rows` rows with `n_fraud` fraud rows spread evenly through the file
pub fn transactions(n_rows: usize, n_fraud: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let stride = n_rows / n_fraud.max(1);
    (0..n_rows)
        .map(|i| {
            let fraud = n_fraud > 0 && i % stride == stride / 2 && i / stride < n_fraud;
            transaction(&mut rng, i, fraud)
        })
        .collect()
}

pub fn header() -> Vec<String> {
    expected_columns()
}

/// Write rows as CSV, label as an integer
pub fn write_csv(path: &Path, header: &[String], rows: &[Vec<f64>]) {
    let mut text = header.join(",");
    text.push('\n');
    for row in rows {
        let (label, values) = row.split_last().unwrap();
        let mut cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        cells.push(format!("{}", *label as i64));
        text.push_str(&cells.join(","));
        text.push('\n');
    }
    fs::write(path, text).unwrap();
}

/// Write a well-formed dataset file and return its path
pub fn write_dataset(dir: &Path, name: &str, n_rows: usize, n_fraud: usize, seed: u64) -> PathBuf {
    let path = dir.join(name);
    write_csv(&path, &header(), &transactions(n_rows, n_fraud, seed));
    path
}
