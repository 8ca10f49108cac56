//! Benchmarks for the quality scorer and drift detector.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qualiflow::dataset::Dataset;
use qualiflow::quality::{DataQualityScorer, DriftDetector, QualityConfig};

fn synthetic_dataset(rows: usize) -> Dataset {
    #[allow(clippy::cast_precision_loss)]
    let ids: Vec<f64> = (0..rows).map(|i| i as f64).collect();
    let labels: Vec<&str> = (0..rows).map(|i| if i % 2 == 0 { "M" } else { "B" }).collect();
    let mut builder = Dataset::builder()
        .numeric_dense("id", ids)
        .categorical_dense("diagnosis", labels);
    for feature in 0..10 {
        #[allow(clippy::cast_precision_loss)]
        let values: Vec<f64> = (0..rows)
            .map(|i| 10.0 + ((i * 7 + feature * 13) % 97) as f64 / 10.0)
            .collect();
        builder = builder.numeric_dense(format!("feature_{feature}"), values);
    }
    builder.build().unwrap()
}

fn bench_run_checks(c: &mut Criterion) {
    let config = QualityConfig::default().with_target("diagnosis", ["M", "B"]);
    let scorer = DataQualityScorer::new(config);
    let dataset = synthetic_dataset(1_000);

    c.bench_function("quality_run_checks_1k_rows", |b| {
        b.iter(|| black_box(scorer.run_checks(black_box(&dataset), "bench")));
    });
}

fn bench_drift_compare(c: &mut Criterion) {
    let detector = DriftDetector::default();
    let reference = synthetic_dataset(1_000);
    let current = synthetic_dataset(1_000);

    c.bench_function("drift_compare_1k_rows", |b| {
        b.iter(|| black_box(detector.compare(black_box(&reference), black_box(&current))));
    });
}

criterion_group!(benches, bench_run_checks, bench_drift_compare);
criterion_main!(benches);
