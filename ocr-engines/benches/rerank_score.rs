use criterion::{criterion_group, criterion_main, Criterion};
use ocr_core::RecognitionResult;
use ocr_engines::parseq_enhanced::{EnhancedConfig, EnhancedEngine};
use std::time::Duration;

fn bench_rerank_score(c: &mut Criterion) {
    let engine = EnhancedEngine::new(EnhancedConfig::default());
    let result = RecognitionResult::new("BEST BEFORE 31/12/2026", 0.87);

    let mut group = c.benchmark_group("rerank_score");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("single_candidate", |b| {
        b.iter(|| engine.rerank_score(&result));
    });

    group.finish();
}

criterion_group!(benches, bench_rerank_score);
criterion_main!(benches);
