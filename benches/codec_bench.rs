//! Performance benchmarks for frame encoding and the receive state
//! machine.
//!
//! Run with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bridge_core::types::{ChannelId, SeqNo};
use bridge_protocol::fletcher::FletcherAccumulator;
use bridge_protocol::frame::{Frame, FrameType};
use bridge_protocol::stream_parser::StreamParser;
use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_encode_small_payload(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_small_payload");
    group.throughput(Throughput::Elements(1));

    let payload = vec![0xABu8; 16];
    group.bench_function("encode_16_bytes", |b| {
        b.iter(|| {
            let frame = Frame::new(FrameType::Data, SeqNo(1), ChannelId::new(4), &payload);
            let mut buf = BytesMut::new();
            black_box(frame.encode(&mut buf));
        });
    });

    group.finish();
}

fn bench_encode_mtu_payload(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_mtu_payload");
    group.throughput(Throughput::Bytes(16384));

    let payload = vec![0xABu8; 16384];
    group.bench_function("encode_16384_bytes", |b| {
        b.iter(|| {
            let frame = Frame::new(FrameType::Data, SeqNo(1), ChannelId::new(4), &payload);
            let mut buf = BytesMut::new();
            black_box(frame.encode(&mut buf));
        });
    });

    group.finish();
}

fn bench_decode_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_round_trip");

    for size in [16usize, 256, 4096, 16384] {
        let payload = vec![0x42u8; size];
        let frame = Frame::new(FrameType::Data, SeqNo(1), ChannelId::new(4), &payload);
        let mut wire = BytesMut::new();
        frame.encode(&mut wire);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            b.iter(|| {
                let mut parser = StreamParser::new();
                for &byte in wire.iter() {
                    black_box(parser.feed(byte));
                }
            });
        });
    }

    group.finish();
}

fn bench_fletcher_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("fletcher_checksum");

    for size in [64usize, 1024, 16384] {
        let data = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| black_box(FletcherAccumulator::compute(data)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_small_payload,
    bench_encode_mtu_payload,
    bench_decode_round_trip,
    bench_fletcher_checksum
);
criterion_main!(benches);
