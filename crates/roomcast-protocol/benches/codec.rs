//! Codec benchmarks for roomcast-protocol.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use roomcast_protocol::{codec, ChatFrame, StoredMessage};

fn chat_frame(size: usize) -> Vec<u8> {
    let frame = ChatFrame::new("room:bench", "A".repeat(size), "aXZ2YWx1ZQ==");
    serde_json::to_vec(&frame).unwrap()
}

fn bench_decode_small(c: &mut Criterion) {
    let encoded = chat_frame(64);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("small_64B", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_decode_large(c: &mut Criterion) {
    let encoded = chat_frame(64 * 1024);

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("large_64KB", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_encode_record(c: &mut Criterion) {
    let now = Utc::now();
    let record = StoredMessage {
        id: "6f1c7c8e-2d1b-4a51-9b1e-3c8f2f0e9a11".to_string(),
        created_at: now,
        updated_at: now,
        content: "A".repeat(256),
        iv: "aXZ2YWx1ZQ==".to_string(),
        chat_id: "room:bench".to_string(),
        sender_id: "user:bench".to_string(),
    };

    c.bench_function("encode_record_256B", |b| {
        b.iter(|| codec::encode(black_box(&record)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_decode_small,
    bench_decode_large,
    bench_encode_record
);
criterion_main!(benches);
