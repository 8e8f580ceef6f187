//! Spanring - Benchmark Report
//!
//! Perbandingan apples-to-apples:
//! - Ring: atomic cursor vs plain cursor
//! - CircularBuffer: atomic vs plain cursor
//! - CircularBuffer: mirrored region vs split-copy fallback

use std::cell::Cell;
use std::sync::atomic::AtomicUsize;
use std::time::Instant;

use spanring::core::{
    CircularBuffer, Cursor, DefaultRegion, Region, Ring, RingError, SplitCopy,
};

const RING_CAPACITY: usize = 65536;
const BUFFER_CAPACITY: usize = 64 * 1024;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spanring=info")),
        )
        .init();

    println!("🚀 Spanring - Lock-Free SPSC Ring Buffers");
    println!("=========================================\n");

    benchmark_ring::<AtomicUsize>("atomic");
    benchmark_ring::<Cell<usize>>("plain");

    if let Err(e) = run_buffer_benchmarks() {
        eprintln!("❌ Buffer setup failed: {}", e);
        std::process::exit(1);
    }

    println!("\n✅ All benchmarks complete!");
    println!("\nTo start relay: cargo run --release --bin spanring_relay -- --bind 0.0.0.0:9999");
}

fn run_buffer_benchmarks() -> Result<(), RingError> {
    benchmark_buffer::<AtomicUsize, DefaultRegion<u8>>("atomic")?;
    benchmark_buffer::<Cell<usize>, DefaultRegion<u8>>("plain")?;
    benchmark_buffer::<AtomicUsize, SplitCopy<u8>>("atomic")?;
    Ok(())
}

fn benchmark_ring<C: Cursor>(cursor: &str) {
    println!("📊 Ring Benchmark ({} cursor)", cursor);
    println!("-----------------------------");

    const ITERATIONS: usize = 1_000_000;
    let mut ring: Ring<u64, RING_CAPACITY, C> = Ring::new();

    // Warm up
    for i in 0..1000 {
        ring.push(i);
    }
    while ring.pop().is_some() {}

    // Benchmark push
    let start = Instant::now();
    for i in 0..ITERATIONS {
        while !ring.push(i as u64) {
            ring.pop();
        }
    }
    let push_duration = start.elapsed();

    // Drain lalu isi ulang untuk benchmark pop
    while ring.pop().is_some() {}
    for i in 0..RING_CAPACITY {
        ring.push(i as u64);
    }

    let start = Instant::now();
    let mut popped = 0usize;
    while popped < ITERATIONS {
        match ring.pop() {
            Some(v) => {
                popped += 1;
                ring.push(v);
            }
            None => break,
        }
    }
    let pop_duration = start.elapsed();

    let push_ns = push_duration.as_nanos() as f64 / ITERATIONS as f64;
    let pop_ns = pop_duration.as_nanos() as f64 / popped.max(1) as f64;

    println!("  Operations: {}", ITERATIONS);
    println!("  Push latency:     {:.2} ns/op", push_ns);
    println!("  Pop+push latency: {:.2} ns/op", pop_ns);
    println!(
        "  Throughput:       {:.2} M ops/sec\n",
        ITERATIONS as f64 / push_duration.as_secs_f64() / 1_000_000.0
    );
}

fn benchmark_buffer<C: Cursor, R: Region<u8>>(cursor: &str) -> Result<(), RingError> {
    println!(
        "📊 CircularBuffer Benchmark ({} region, {} cursor)",
        R::STRATEGY,
        cursor
    );
    println!("--------------------------------------------------");

    const ITERATIONS: usize = 1_000_000;
    // Tidak membagi capacity, jadi span rutin melewati batas wrap
    const MSG_SIZE: usize = 100;

    let mut buffer: CircularBuffer<u8, BUFFER_CAPACITY, C, R> = CircularBuffer::new()?;
    let msg = [0x5Au8; MSG_SIZE];
    let mut out = [0u8; MSG_SIZE];

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        let mut claim = buffer.peek_back(MSG_SIZE);
        let n = claim.len();
        claim.copy_from_slice(&msg[..n]);
        claim.commit_written();

        let claim = buffer.peek_front(MSG_SIZE);
        out[..claim.len()].copy_from_slice(&claim);
        claim.commit_read();
    }
    let cycle_duration = start.elapsed();

    let cycle_ns = cycle_duration.as_nanos() as f64 / ITERATIONS as f64;

    println!("  Message size: {} bytes", MSG_SIZE);
    println!("  Operations: {}", ITERATIONS);
    println!("  Write+read latency: {:.2} ns/msg", cycle_ns);
    println!(
        "  Throughput:         {:.2} MB/sec\n",
        (ITERATIONS * MSG_SIZE) as f64 / cycle_duration.as_secs_f64() / 1_000_000.0
    );

    Ok(())
}
