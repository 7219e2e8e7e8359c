use criterion::{criterion_group, criterion_main, Criterion};
use ocr_eval::metrics::{confusion_pairs, ItemMetrics};
use std::time::Duration;

const GROUND_TRUTH: &str = "BEST BEFORE 31/12/2026 LOT A4F9K2";
const PREDICTED: &str = "8EST BEF0RE 31/12/2O26 L0T A4F9K2";

fn bench_item_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("item_metrics");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("calculate", |b| {
        b.iter(|| ItemMetrics::calculate(GROUND_TRUTH, PREDICTED));
    });

    group.finish();
}

fn bench_confusion_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("confusion_pairs");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("alignment", |b| {
        b.iter(|| confusion_pairs(GROUND_TRUTH, PREDICTED));
    });

    group.finish();
}

criterion_group!(benches, bench_item_metrics, bench_confusion_pairs);
criterion_main!(benches);
