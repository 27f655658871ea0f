//! Throughput benchmarks for RoomCast.
//!
//! These benchmarks measure the raw routing throughput of the hub.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use roomcast_bench::{drain, populated_hub};
use roomcast_core::{Connection, ConnectionConfig, Hub};
use std::sync::Arc;

/// Benchmark hub membership operations.
fn bench_hub(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub");

    // Join + leave, creating and deleting a room each time
    group.bench_function("join_leave_fresh_room", |b| {
        let hub = Arc::new(Hub::new());
        let mut i = 0u64;
        b.iter(|| {
            let room = format!("room:{}", i);
            i += 1;
            let (conn, _outbox) = Connection::new(&hub, &room, "peer", ConnectionConfig::default());
            hub.join(&room, "peer", conn);
            hub.leave(&room, "peer");
        });
    });

    // Join + leave in a busy room
    group.bench_function("join_leave_busy_room", |b| {
        let (hub, _peers) = populated_hub("busy", 100);
        b.iter(|| {
            let (conn, _outbox) = Connection::new(&hub, "busy", "guest", ConnectionConfig::default());
            hub.join("busy", "guest", conn);
            hub.leave("busy", "guest");
        });
    });

    group.bench_function("list_peers_100", |b| {
        let (hub, _peers) = populated_hub("busy", 100);
        b.iter(|| hub.list_peers(black_box("busy")));
    });

    group.finish();
}

/// Benchmark directed sends.
fn bench_send_to(c: &mut Criterion) {
    let (hub, mut peers) = populated_hub("room", 100);
    let data = Bytes::from(vec![0u8; 256]);

    c.bench_function("send_to_in_100", |b| {
        b.iter(|| {
            hub.send_to("room", black_box("peer-42"), data.clone());
            drain(&mut peers[42..43]);
        })
    });
}

/// Benchmark fan-out scenarios.
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let (hub, mut peers) = populated_hub("broadcast", size);
            let data = Bytes::from(vec![0u8; 256]);

            b.iter(|| {
                hub.broadcast("broadcast", black_box(data.clone()), Some("peer-0"));
                drain(&mut peers)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hub, bench_send_to, bench_fanout);
criterion_main!(benches);
