use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fraud_pipeline::training::{RandomForest, TrainingConfig};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Imbalanced data: ~1% positives shifted along the first five features
fn create_imbalanced_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let labels: Array1<f64> = (0..n_rows)
        .map(|i| if i % 100 == 0 { 1.0 } else { 0.0 })
        .collect();
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, j)| {
        let shift = if labels[i] > 0.5 && j < 5 { 3.0 } else { 0.0 };
        rng.gen_range(-1.0..1.0) + shift
    });
    (x, labels)
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1000, 5000, 20000].iter() {
        let (x, y) = create_imbalanced_data(*n_rows, 30);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut forest = RandomForest::new(TrainingConfig::default().with_n_estimators(20));
                forest.fit(black_box(x), black_box(y)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let (x, y) = create_imbalanced_data(5000, 30);
    let mut forest = RandomForest::new(TrainingConfig::default().with_n_estimators(50));
    forest.fit(&x, &y).unwrap();

    for batch in [1, 100, 1000].iter() {
        let rows = x.slice(ndarray::s![..*batch, ..]).to_owned();
        group.bench_with_input(BenchmarkId::new("predict_proba", batch), &rows, |b, rows| {
            b.iter(|| forest.predict_proba(black_box(rows)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
