use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use lattice_types::Root;
use lattice_work::{validate_work, WorkGenerator, WorkThresholds};

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("work_generation");
    let root = Root::new([0x42; 32]);

    for difficulty in [0u64, 1_000, 1 << 56, WorkThresholds::DEV.epoch_2_receive] {
        group.bench_with_input(BenchmarkId::new("generate", difficulty), &difficulty, |b, &diff| {
            b.iter(|| black_box(WorkGenerator.generate(black_box(&root), black_box(diff)).unwrap()));
        });
    }

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    let root = Root::new([0x42; 32]);
    let difficulty = WorkThresholds::DEV.epoch_1;
    let nonce = WorkGenerator.generate(&root, difficulty).unwrap();

    c.bench_function("work_validate", |b| {
        b.iter(|| black_box(validate_work(black_box(&root), black_box(nonce.0), difficulty)));
    });
}

fn bench_normalization(c: &mut Criterion) {
    let thresholds = WorkThresholds::LIVE;
    c.bench_function("normalized_multiplier", |b| {
        b.iter(|| black_box(thresholds.normalized_multiplier(black_box(3.25), thresholds.epoch_1)));
    });
}

criterion_group!(benches, bench_generation, bench_validation, bench_normalization);
criterion_main!(benches);
