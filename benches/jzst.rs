use bytes::{Bytes, BytesMut};
use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use jzst::protocol::constants::MAX_CHUNK_PAYLOAD;
use jzst::protocol::{ControlMessage, FramePacket, MessageType, StreamConfig, split_frame};
use jzst::transport::FrameAssembler;
use std::hint::black_box;
use std::time::{Duration, Instant};

fn create_test_frame(size: usize) -> Bytes {
    (0..size).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
}

fn bench_control_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_encode");

    for size in [0usize, 32, 1024, 60_000] {
        let msg = ControlMessage::new(MessageType::Config, vec![0xAB; size]).unwrap();
        group.throughput(Throughput::Bytes(msg.encoded_len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &msg, |b, msg| {
            b.iter(|| {
                let mut buf = BytesMut::with_capacity(msg.encoded_len());
                msg.encode(black_box(&mut buf));
                black_box(buf);
            });
        });
    }

    group.finish();
}

fn bench_control_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_decode");

    let start = ControlMessage::start_stream(&StreamConfig::default())
        .unwrap()
        .to_bytes();
    group.bench_function("start_stream", |b| {
        b.iter(|| {
            let msg = ControlMessage::decode(black_box(&start)).unwrap();
            black_box(StreamConfig::decode(msg.payload()).unwrap());
        });
    });

    let large = ControlMessage::new(MessageType::Config, vec![0xCD; 60_000])
        .unwrap()
        .to_bytes();
    group.throughput(Throughput::Bytes(large.len() as u64));
    group.bench_function("60000", |b| {
        b.iter(|| black_box(ControlMessage::decode(black_box(&large)).unwrap()));
    });

    group.finish();
}

fn bench_frame_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_split");

    for size in [16 * 1024usize, 256 * 1024, 2 * 1024 * 1024] {
        let frame = create_test_frame(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| {
                let packets = split_frame(1, 0, black_box(frame), MAX_CHUNK_PAYLOAD).unwrap();
                for packet in &packets {
                    black_box(packet.to_bytes());
                }
            });
        });
    }

    group.finish();
}

fn bench_frame_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_reassembly");

    for size in [256 * 1024usize, 2 * 1024 * 1024] {
        let frame = create_test_frame(size);
        let mut datagrams: Vec<Bytes> = split_frame(7, 0, &frame, MAX_CHUNK_PAYLOAD)
            .unwrap()
            .iter()
            .map(FramePacket::to_bytes)
            .collect();
        datagrams.reverse();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &datagrams, |b, datagrams| {
            b.iter_batched(
                || FrameAssembler::new(Duration::from_secs(2), 256),
                |mut assembler| {
                    let now = Instant::now();
                    let mut done = None;
                    for datagram in datagrams {
                        let packet = FramePacket::decode(datagram.clone()).unwrap();
                        if let Some(frame) = assembler.add(packet, now).unwrap() {
                            done = Some(frame);
                        }
                    }
                    black_box(done.unwrap());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_control_encode,
    bench_control_decode,
    bench_frame_split,
    bench_frame_reassembly
);
criterion_main!(benches);
