// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Benchmarks for the event dispatcher's immediate-mode hot path
//! under a varying handler count.
//!
//! Run with: cargo bench -p nlib-core --bench dispatch_hot_path

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nlib_core::events::{Dispatcher, DispatchMode, EventEnvelope, Priority};

fn bench_dispatch_immediate(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_hot_path");

    for handler_count in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("immediate_dispatch", handler_count),
            &handler_count,
            |b, &handler_count| {
                let dispatcher = Dispatcher::new();
                let counter = Arc::new(AtomicUsize::new(0));
                for _ in 0..handler_count {
                    let counter = counter.clone();
                    dispatcher.register_global(Priority::NORMAL, move |_event| {
                        counter.fetch_add(1, Ordering::Relaxed);
                    });
                }

                b.iter(|| {
                    dispatcher
                        .submit(EventEnvelope::new("bench.tick", black_box(42_u32)), DispatchMode::Immediate)
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_dispatch_immediate);
criterion_main!(benches);
