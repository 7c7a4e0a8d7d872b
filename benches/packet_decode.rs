//! Decode throughput benchmarks.
//!
//! Run with: `cargo bench --features benchmark`

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use marshal::Packet;
use marshal::test_utils::{TelemetryFrameBuilder, additional_roster_frame, roster_frame};

fn bench_telemetry_decode(c: &mut Criterion) {
    let frame = TelemetryFrameBuilder::racing()
        .num_participants(16)
        .laps_in_event(10)
        .grid(16)
        .current_time(95.5)
        .build();

    c.bench_function("decode_telemetry_frame", |b| {
        b.iter(|| Packet::decode(black_box(&frame)).unwrap())
    });
}

fn bench_roster_decode(c: &mut Criterion) {
    let names: Vec<String> = (0..16).map(|i| format!("Driver {i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let roster = roster_frame("Formula A", "Open Wheel", "Eifelwald", "Grand Prix", &refs);
    let additional = additional_roster_frame(16, &refs);

    c.bench_function("decode_roster_frame", |b| {
        b.iter(|| Packet::decode(black_box(&roster)).unwrap())
    });
    c.bench_function("decode_additional_roster_frame", |b| {
        b.iter(|| Packet::decode(black_box(&additional)).unwrap())
    });
}

fn bench_classification_rejects(c: &mut Criterion) {
    let garbage = vec![0u8; 512];
    c.bench_function("reject_unrecognized_length", |b| {
        b.iter(|| Packet::decode(black_box(&garbage)).is_err())
    });
}

criterion_group!(
    benches,
    bench_telemetry_decode,
    bench_roster_decode,
    bench_classification_rejects
);
criterion_main!(benches);
