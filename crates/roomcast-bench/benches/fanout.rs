//! Hub benchmarks: broadcast fan-out and client churn.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use roomcast_bench::{drain, hub_with_subscribers, sample_broadcast};
use roomcast_core::{BroadcastOutcome, ClientHandle, ClientId};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime")
}

/// Persist and fan out one message to rooms of growing size.
fn bench_broadcast(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("broadcast");

    for subscribers in [10usize, 100, 1000] {
        let (mut hub, mut endpoints) = rt.block_on(hub_with_subscribers(subscribers, 16));
        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    let outcome = rt.block_on(hub.broadcast(sample_broadcast(64)));
                    debug_assert!(matches!(outcome, BroadcastOutcome::Delivered { .. }));
                    black_box(drain(&mut endpoints));
                });
            },
        );
    }

    group.finish();
}

/// Register and unregister a client that belongs to one busy room.
fn bench_churn(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("churn");

    group.bench_function("register_unregister", |b| {
        let (mut hub, _endpoints) = rt.block_on(hub_with_subscribers(100, 16));
        b.iter(|| {
            let (handle, endpoint) =
                ClientHandle::with_id(ClientId::new("conn-0"), "user-0", 16);
            let id = handle.id().clone();
            hub.unregister(&id);
            rt.block_on(hub.register(handle));
            black_box(endpoint);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_broadcast, bench_churn);
criterion_main!(benches);
