use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::sync::Arc;

use statebox::{persist, shallow, MemoryStorage, PersistOptions, Store};

#[derive(Clone, Serialize, Deserialize)]
struct State {
    counter: usize,
    name: String,
}

fn state() -> State {
    State {
        counter: 0,
        name: "test".to_string(),
    }
}

fn store_read_benchmark(c: &mut Criterion) {
    let store = Store::new(state());

    c.bench_function("store_read", |b| {
        b.iter(|| {
            black_box(store.read(|s| s.counter));
        });
    });
}

fn store_update_benchmark(c: &mut Criterion) {
    let store = Store::new(state());

    c.bench_function("store_update", |b| {
        let mut i = 0;
        b.iter(|| {
            store.update(|state| {
                state.counter = black_box(i);
            });
            i += 1;
        });
    });
}

fn store_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let store = Store::new(state());

        for _ in 0..*subscriber_count {
            store.subscribe(|_, _| {
                // Empty subscriber
            });
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.update(|state| state.counter = black_box(i));
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn selector_fanout_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_fanout");

    for selector_count in [1, 10, 100].iter() {
        let store = Store::new(state());

        // Selectors watch a slice that never changes, so every write is
        // compared and filtered out.
        for _ in 0..*selector_count {
            store.subscribe_with_selector(|s| s.name.clone(), |_, _| {});
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(selector_count),
            selector_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.update(|state| state.counter = black_box(i));
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn shallow_compare_benchmark(c: &mut Criterion) {
    let a: Vec<usize> = (0..64).collect();
    let b = a.clone();

    c.bench_function("shallow_vec_64", |bench| {
        bench.iter(|| black_box(shallow(black_box(&a), black_box(&b))));
    });
}

fn persisted_write_benchmark(c: &mut Criterion) {
    let storage = Arc::new(MemoryStorage::new());
    let store = persist(
        Store::new(state()),
        PersistOptions::new("bench").storage(storage),
    );

    c.bench_function("persisted_update", |b| {
        let mut i = 0;
        b.iter(|| {
            store.update(|state| state.counter = black_box(i));
            i += 1;
        });
    });
}

criterion_group!(
    benches,
    store_read_benchmark,
    store_update_benchmark,
    store_subscribe_benchmark,
    selector_fanout_benchmark,
    shallow_compare_benchmark,
    persisted_write_benchmark,
);
criterion_main!(benches);
