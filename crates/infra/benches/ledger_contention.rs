use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use stockyard_catalog::ProductId;
use stockyard_infra::ledger::{InMemoryStockLedger, StockLedger};
use stockyard_infra::saga::{ReservationSaga, ReservationStep};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .expect("tokio runtime")
}

/// Uncontended reserve + release pair on one product.
fn bench_reserve_release(c: &mut Criterion) {
    let rt = runtime();
    let ledger = InMemoryStockLedger::new();
    let product = ProductId::generate();
    rt.block_on(ledger.seed(product, 1_000)).unwrap();

    let mut group = c.benchmark_group("ledger");
    group.throughput(Throughput::Elements(1));
    group.bench_function("reserve_release_pair", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(ledger.try_reserve(product, 1).await.unwrap());
                black_box(ledger.release(product, 1).await.unwrap());
            })
        });
    });
    group.finish();
}

/// Many tasks racing for the same product until it is sold out.
fn bench_sell_out_contention(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("ledger_contention");

    for tasks in [4usize, 16, 64] {
        group.throughput(Throughput::Elements(tasks as u64));
        group.bench_with_input(BenchmarkId::new("sell_out", tasks), &tasks, |b, &tasks| {
            b.iter(|| {
                rt.block_on(async {
                    let ledger: Arc<dyn StockLedger> = Arc::new(InMemoryStockLedger::new());
                    let product = ProductId::generate();
                    ledger.seed(product, (tasks / 2) as u32).await.unwrap();

                    let handles: Vec<_> = (0..tasks)
                        .map(|_| {
                            let ledger = ledger.clone();
                            tokio::spawn(async move { ledger.try_reserve(product, 1).await.is_ok() })
                        })
                        .collect();

                    let mut sold = 0;
                    for handle in handles {
                        if handle.await.unwrap() {
                            sold += 1;
                        }
                    }
                    assert_eq!(sold, tasks / 2);
                })
            });
        });
    }
    group.finish();
}

/// Multi-line checkout whose last line fails, forcing full compensation.
fn bench_saga_compensation(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("reservation_saga");

    for lines in [2usize, 8, 32] {
        let ledger: Arc<dyn StockLedger> = Arc::new(InMemoryStockLedger::new());
        let products: Vec<ProductId> = (0..lines).map(|_| ProductId::generate()).collect();
        rt.block_on(async {
            for p in &products {
                ledger.seed(*p, 10).await.unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::new("compensate", lines), &lines, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    let steps = products
                        .iter()
                        .enumerate()
                        .map(|(i, p)| ReservationStep {
                            product: *p,
                            quantity: if i + 1 == products.len() { 11 } else { 1 },
                        })
                        .collect();
                    let mut saga = ReservationSaga::new(Arc::clone(&ledger));
                    black_box(saga.reserve_all(steps).await.is_err());
                })
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_reserve_release,
    bench_sell_out_contention,
    bench_saga_compensation
);
criterion_main!(benches);
