//! Criterion benchmark untuk Ring dan CircularBuffer
//!
//! Run dengan: cargo bench

use std::cell::Cell;
use std::sync::atomic::AtomicUsize;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use spanring::core::{CircularBuffer, Cursor, DefaultRegion, Region, Ring, SplitCopy};

fn bench_ring_cycle<C: Cursor>(c: &mut Criterion, name: &str) {
    let mut group = c.benchmark_group("ring");
    group.throughput(Throughput::Elements(1));

    group.bench_function(format!("push_pop_cycle/{}", name), |b| {
        let mut ring: Ring<u64, 65536, C> = Ring::new();
        let mut i = 0u64;
        b.iter(|| {
            ring.push(black_box(i));
            let _ = black_box(ring.pop());
            i = i.wrapping_add(1);
        });
    });

    group.finish();
}

fn bench_ring(c: &mut Criterion) {
    bench_ring_cycle::<AtomicUsize>(c, "atomic");
    bench_ring_cycle::<Cell<usize>>(c, "plain");
}

fn bench_buffer_spans<C: Cursor, R: Region<u8>>(c: &mut Criterion, name: &str) {
    let mut group = c.benchmark_group("circular_buffer");

    // 100 tidak membagi capacity: sebagian span melewati batas wrap
    for msg_size in [64usize, 100, 1500].iter() {
        group.throughput(Throughput::Bytes(*msg_size as u64));
        group.bench_function(format!("{}/{}", name, msg_size), |b| {
            let mut buf: CircularBuffer<u8, 65536, C, R> = CircularBuffer::new().unwrap();
            let msg = vec![0xA5u8; *msg_size];
            b.iter(|| {
                let mut claim = buf.peek_back(msg.len());
                let n = claim.len();
                claim.copy_from_slice(&msg[..n]);
                claim.commit_written();

                let claim = buf.peek_front(msg.len());
                black_box(&claim[..]);
                claim.commit_read();
            });
        });
    }

    group.finish();
}

fn bench_buffer(c: &mut Criterion) {
    bench_buffer_spans::<AtomicUsize, DefaultRegion<u8>>(c, "default_atomic");
    bench_buffer_spans::<Cell<usize>, DefaultRegion<u8>>(c, "default_plain");
    bench_buffer_spans::<AtomicUsize, SplitCopy<u8>>(c, "split_copy_atomic");
}

criterion_group!(benches, bench_ring, bench_buffer);
criterion_main!(benches);
