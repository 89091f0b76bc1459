//! # Lockstep Benchmarks
//!
//! | Area | What is measured |
//! |------|------------------|
//! | Lock table | Grant/release of shared locks across many rows |
//! | Wait-for graph | Cycle search through a long wait chain |
//! | Scenario | One full deadlock iteration against the in-memory engine |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lockstep_engine::{choose_victim, find_cycle, EngineConfig, InMemoryEngine, LockKind, LockTable};
use lockstep_harness::{catalog, CatalogConfig, ScenarioOrchestrator};
use shared_types::{Dialect, TxnId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Lock table
// ============================================================================

fn bench_lock_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock-table");

    for rows in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(rows));
        group.bench_with_input(BenchmarkId::new("shared_grant_release", rows), &rows, |b, &rows| {
            b.iter(|| {
                let mut table = LockTable::new(Dialect::Mysql);
                for row in 0..rows {
                    black_box(table.request(TxnId(1), row, LockKind::Shared));
                    black_box(table.request(TxnId(2), row, LockKind::Shared));
                }
                black_box(table.release_all(TxnId(1)));
                black_box(table.release_all(TxnId(2)));
            })
        });
    }

    group.finish();
}

// ============================================================================
// Wait-for graph
// ============================================================================

/// 1 → 2 → ... → n → 1
fn ring(n: u64) -> HashMap<TxnId, Vec<TxnId>> {
    (1..=n)
        .map(|txn| (TxnId(txn), vec![TxnId(txn % n + 1)]))
        .collect()
}

fn bench_cycle_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait-for-graph");

    for n in [2u64, 16, 256] {
        let graph = ring(n);
        group.bench_with_input(BenchmarkId::new("find_cycle_ring", n), &graph, |b, graph| {
            b.iter(|| {
                let cycle = find_cycle(black_box(graph), TxnId(1)).unwrap_or_default();
                black_box(choose_victim(&cycle, |txn| txn.0 as usize % 3))
            })
        });
    }

    group.finish();
}

// ============================================================================
// Full scenario
// ============================================================================

fn bench_deadlock_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenario");
    group.measurement_time(Duration::from_secs(10));

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => panic!("failed to build runtime: {e}"),
    };
    let config = CatalogConfig {
        writer_delay_ms: 1,
        hold_delay_ms: 1,
    };
    let spec = catalog::deadlock(&config);
    let orchestrator = ScenarioOrchestrator::new(Arc::new(InMemoryEngine::new(EngineConfig::for_dialect(
        Dialect::Mysql,
    ))));

    group.bench_function("deadlock_iteration", |b| {
        b.iter(|| black_box(runtime.block_on(orchestrator.run(&spec)).is_ok()))
    });

    group.finish();
}

criterion_group!(benches, bench_lock_table, bench_cycle_search, bench_deadlock_iteration);
criterion_main!(benches);
