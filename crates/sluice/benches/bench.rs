use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use sluice::{Item, MemoryStore, Pipeline, SentinelRule, Store, handoff};
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;

const TOTAL_ITEMS: usize = 10_000;

/// Drops every item so the bench measures the pipeline itself.
#[derive(Default)]
struct DiscardStore;

impl Store for DiscardStore {
    fn persist(&mut self, item: Item) -> Result<(), sluice::PersistError> {
        black_box(item);
        Ok(())
    }
}

fn bench_pipeline(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));

    group.bench_function("run/discard", |b| {
        b.to_async(&rt).iter(|| async {
            let upstream = CancellationToken::new();
            let items = (0..TOTAL_ITEMS as Item).collect();
            let outcome = Pipeline::new(items, SentinelRule::new(None, 2), DiscardStore, &upstream)
                .run()
                .await;
            assert!(outcome.is_success());
        });
    });

    group.bench_function("run/memory", |b| {
        b.to_async(&rt).iter(|| async {
            let upstream = CancellationToken::new();
            let store = MemoryStore::new();
            let items = (0..TOTAL_ITEMS as Item).collect();
            let outcome = Pipeline::new(items, SentinelRule::new(None, 2), store.clone(), &upstream)
                .run()
                .await;
            assert!(outcome.is_success());
            black_box(store.items());
        });
    });

    group.finish();
}

fn bench_handoff(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("handoff");
    group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));

    group.bench_function("send_recv", |b| {
        b.to_async(&rt).iter(|| async {
            let (tx, mut rx) = handoff::channel::<Item>();
            let producer = tokio::spawn(async move {
                for i in 0..TOTAL_ITEMS as Item {
                    tx.send(i).await.unwrap();
                }
            });
            while let Some(item) = rx.recv().await {
                black_box(item);
            }
            producer.await.unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_handoff);
criterion_main!(benches);
