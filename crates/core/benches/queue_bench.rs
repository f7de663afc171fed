//! Dedup scan cost as the pending queue grows

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dirwatch_core::{ChangeQueue, ChangeRecord, ChangeType};

fn bench_push_unique(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_unique");

    for pending in [10usize, 1_000, 10_000] {
        let queue = ChangeQueue::new();
        for i in 0..pending {
            queue.push(ChangeRecord::new(ChangeType::Modified, format!("/w/{}", i)));
        }

        // Hits the last pending path so the scan walks the whole queue
        let duplicate = ChangeRecord::new(ChangeType::Modified, format!("/w/{}", pending - 1));

        group.bench_with_input(BenchmarkId::from_parameter(pending), &pending, |b, _| {
            b.iter(|| black_box(queue.push_unique(duplicate.clone())));
        });
    }

    group.finish();
}

fn bench_push_pop(c: &mut Criterion) {
    let queue = ChangeQueue::new();
    let record = ChangeRecord::renamed("/w/a.txt", "/w/b.txt");

    c.bench_function("push_pop_rename", |b| {
        b.iter(|| {
            queue.push(record.clone());
            black_box(queue.pop())
        });
    });
}

criterion_group!(benches, bench_push_unique, bench_push_pop);
criterion_main!(benches);
