//! Criterion benchmarks for push/shift throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use venom_ring::{create_ring_buffer, create_ring_buffer_with, HeapAllocator};

fn bench_push_shift(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_shift_u8");

    for chunk in [16usize, 256, 4096] {
        let ring = create_ring_buffer::<u8>(64 * 1024).unwrap();
        let input = vec![0xABu8; chunk];
        let mut output = vec![0u8; chunk];

        group.throughput(Throughput::Bytes(chunk as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, _| {
            b.iter(|| {
                ring.push(black_box(&input)).unwrap();
                black_box(ring.shift_and_copy(&mut output));
            })
        });
    }

    group.finish();
}

fn bench_wrapping(c: &mut Criterion) {
    // Capacity not a multiple of the chunk so most runs split
    let ring = create_ring_buffer_with::<f32, _>(1000, &HeapAllocator).unwrap();
    let input = vec![1.0f32; 384];
    let mut output = vec![0.0f32; 384];

    c.bench_function("push_shift_f32_wrapping", |b| {
        b.iter(|| {
            ring.push(black_box(&input)).unwrap();
            black_box(ring.shift_and_copy(&mut output));
        })
    });
}

fn bench_size_queries(c: &mut Criterion) {
    let ring = create_ring_buffer::<u32>(1024).unwrap();
    ring.push(&[1, 2, 3]).unwrap();

    c.bench_function("occupied_size", |b| b.iter(|| black_box(ring.occupied_size())));
}

criterion_group!(benches, bench_push_shift, bench_wrapping, bench_size_queries);
criterion_main!(benches);
