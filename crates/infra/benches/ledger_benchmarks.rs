use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use tokio::runtime::Runtime;

use pharmacy_core::{BranchId, FixedClock, ProductId, StockId};
use pharmacy_infra::store::{InMemoryInventoryStore, StockLedger};
use pharmacy_infra::InventoryServices;
use pharmacy_inventory::{
    BranchDetails, BranchStatus, MovementType, NewMovement, Stock, StockLevels,
};

const P: ProductId = ProductId::new(1);

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Two stocked branches, `stock` units each.
fn seeded(
    rt: &Runtime,
    stock: i64,
) -> (InventoryServices, Arc<InMemoryInventoryStore>, BranchId, BranchId) {
    let store = Arc::new(InMemoryInventoryStore::new());
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));
    let services = InventoryServices::new(store.clone(), clock);

    let (a, b) = rt.block_on(async {
        let a = services
            .branches
            .create(BranchDetails::new("A", "Alpha", BranchStatus::Active))
            .await
            .unwrap()
            .id;
        let b = services
            .branches
            .create(BranchDetails::new("B", "Beta", BranchStatus::Active))
            .await
            .unwrap()
            .id;
        for branch in [a, b] {
            services
                .stock
                .upsert(branch, P, StockLevels::new(stock, 0, i64::MAX))
                .await
                .unwrap();
        }
        (a, b)
    });
    (services, store, a, b)
}

fn bench_domain_apply_delta(c: &mut Criterion) {
    let now = Utc::now();
    let mut stock = Stock::create(
        StockId::new(1),
        BranchId::new(1),
        P,
        StockLevels::new(1_000_000, 0, i64::MAX),
        now,
    );

    c.bench_function("stock_apply_delta", |b| {
        b.iter(|| {
            let _ = stock.apply_delta(black_box(-1), now);
            let _ = stock.apply_delta(black_box(1), now);
        })
    });
}

fn bench_store_apply_delta(c: &mut Criterion) {
    let rt = runtime();
    let (_, store, a, _) = seeded(&rt, 1_000_000);
    let now = Utc::now();

    c.bench_function("in_memory_store_apply_delta", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.apply_delta(a, P, black_box(1), now).await.unwrap();
            })
        })
    });
}

fn bench_record_movements(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("record_movements");

    for count in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("transfer", count), &count, |bench, &count| {
            bench.iter_batched(
                || seeded(&rt, count as i64),
                |(services, _, a, b)| {
                    rt.block_on(async {
                        for _ in 0..count {
                            services
                                .movements
                                .record(NewMovement::transfer(a, b, P, 1))
                                .await
                                .unwrap();
                        }
                    })
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("exit", count), &count, |bench, &count| {
            bench.iter_batched(
                || seeded(&rt, count as i64),
                |(services, _, a, _)| {
                    rt.block_on(async {
                        for _ in 0..count {
                            services
                                .movements
                                .record(NewMovement::new(a, P, MovementType::Exit, 1))
                                .await
                                .unwrap();
                        }
                    })
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_domain_apply_delta,
    bench_store_apply_delta,
    bench_record_movements
);
criterion_main!(benches);
