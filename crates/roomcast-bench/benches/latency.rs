//! Latency benchmarks for RoomCast.
//!
//! These benchmarks measure the time from an inbound envelope to the
//! relayed bytes sitting in the recipients' outbound queues.

use criterion::{criterion_group, criterion_main, Criterion};
use roomcast_bench::{drain, populated_hub};
use roomcast_core::route;
use serde_json::json;
use std::time::Instant;

fn offer_bytes(to: Option<&str>) -> Vec<u8> {
    let mut offer = json!({
        "type": "offer",
        "payload": { "type": "offer", "sdp": "v=0\r\n".repeat(64) },
    });
    if let Some(to) = to {
        offer["to"] = json!(to);
    }
    offer.to_string().into_bytes()
}

/// Benchmark route + enqueue latency.
fn bench_route_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_latency");

    group.bench_function("directed_offer", |b| {
        b.iter_custom(|iters| {
            let (hub, mut peers) = populated_hub("room", 2);
            let sender = peers[0].0.clone();
            let data = offer_bytes(Some("peer-1"));

            let start = Instant::now();
            for _ in 0..iters {
                route(&sender, &hub, &data);
                drain(&mut peers);
            }
            start.elapsed()
        });
    });

    group.bench_function("broadcast_offer_ten_peers", |b| {
        b.iter_custom(|iters| {
            let (hub, mut peers) = populated_hub("room", 10);
            let sender = peers[0].0.clone();
            let data = offer_bytes(None);

            let start = Instant::now();
            for _ in 0..iters {
                route(&sender, &hub, &data);
                drain(&mut peers);
            }
            start.elapsed()
        });
    });

    group.bench_function("ping_pong", |b| {
        b.iter_custom(|iters| {
            let (hub, mut peers) = populated_hub("room", 1);
            let sender = peers[0].0.clone();
            let data = br#"{"type":"ping"}"#;

            let start = Instant::now();
            for _ in 0..iters {
                route(&sender, &hub, data);
                drain(&mut peers);
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_route_latency);
criterion_main!(benches);
