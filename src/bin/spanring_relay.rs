//! Spanring Relay - socket receive loop di atas CircularBuffer
//!
//! Contoh embedding end-to-end:
//! - Thread utama: mio event loop, `read()` langsung ke `peek_back` claim (zero-copy)
//! - Thread consumer: parse record newline-delimited langsung dari `peek_front` claim,
//!   hanya commit sampai record lengkap terakhir
//!
//! Usage:
//!   cargo run --release --bin spanring_relay [OPTIONS]

use std::error::Error;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{info, warn};

use spanring::core::{CircularBuffer, Consumer, Producer};

const LISTENER: Token = Token(0);
const UPSTREAM: Token = Token(1);
const EVENTS_CAPACITY: usize = 128;

/// 1 MiB, kelipatan page size
const RELAY_CAPACITY: usize = 1 << 20;

type RelayBuffer = CircularBuffer<u8, RELAY_CAPACITY>;

/// Relay configuration
struct RelayConfig {
    bind_addr: String,
    stats_interval: Duration,
    once: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9999".to_string(),
            stats_interval: Duration::from_secs(5),
            once: false,
        }
    }
}

/// Relay statistics
#[derive(Default)]
struct RelayStats {
    connections: AtomicU64,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
    records: AtomicU64,
    oversized: AtomicU64,
    full_stalls: AtomicU64,
}

impl RelayStats {
    fn print_stats(&self, uptime: Duration) {
        let bytes_in = self.bytes_in.load(Ordering::Relaxed);
        let bytes_out = self.bytes_out.load(Ordering::Relaxed);
        let records = self.records.load(Ordering::Relaxed);
        let oversized = self.oversized.load(Ordering::Relaxed);
        let stalls = self.full_stalls.load(Ordering::Relaxed);

        let rate = records as f64 / uptime.as_secs_f64();

        println!("\n📊 Relay Stats (uptime: {:.1}s)", uptime.as_secs_f64());
        println!(
            "   Connections:   {}",
            self.connections.load(Ordering::Relaxed)
        );
        println!("   Records:       {} ({:.1}/sec)", records, rate);
        println!("   Bytes in:      {} KB", bytes_in / 1024);
        println!("   Bytes parsed:  {} KB", bytes_out / 1024);
        if oversized > 0 {
            println!("   Oversized:     {} ⚠️", oversized);
        }
        if stalls > 0 {
            println!("   Full stalls:   {} ⚠️", stalls);
        }
    }
}

/// Baca socket sampai WouldBlock, langsung ke free space buffer.
///
/// Returns `true` jika upstream menutup koneksi.
fn drain_socket(
    stream: &mut TcpStream,
    producer: &mut Producer<'_, u8, RELAY_CAPACITY>,
    stats: &RelayStats,
) -> io::Result<bool> {
    loop {
        let mut claim = producer.peek_back(usize::MAX);
        if claim.is_empty() {
            // Buffer penuh: tunggu consumer. Event edge-triggered, jadi tidak boleh
            // kembali ke poll sebelum socket benar-benar WouldBlock.
            drop(claim);
            stats.full_stalls.fetch_add(1, Ordering::Relaxed);
            thread::yield_now();
            continue;
        }

        match stream.read(&mut claim) {
            Ok(0) => return Ok(true),
            Ok(n) => {
                claim.truncate(n);
                claim.commit_written();
                stats.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Consumer loop: hitung record newline-delimited tanpa copy.
fn parse_records(
    mut consumer: Consumer<'_, u8, RELAY_CAPACITY>,
    finished: &AtomicBool,
    stats: &RelayStats,
) {
    loop {
        // Load sebelum peek: kalau producer sudah selesai, peek ini melihat semua data
        let done = finished.load(Ordering::Acquire);
        let mut claim = consumer.peek_front(usize::MAX);

        if claim.is_empty() {
            if done {
                break;
            }
            drop(claim);
            thread::yield_now();
            continue;
        }

        match claim.iter().rposition(|&b| b == b'\n') {
            Some(last) => {
                let records = claim[..=last].iter().filter(|&&b| b == b'\n').count();
                stats.records.fetch_add(records as u64, Ordering::Relaxed);
                claim.truncate(last + 1);
                let n = claim.commit_read();
                stats.bytes_out.fetch_add(n as u64, Ordering::Relaxed);
            }
            None if claim.len() == RELAY_CAPACITY => {
                // Record lebih besar dari buffer: buang
                stats.oversized.fetch_add(1, Ordering::Relaxed);
                let n = claim.commit_read();
                stats.bytes_out.fetch_add(n as u64, Ordering::Relaxed);
            }
            None if done => {
                // Record terakhir tanpa newline
                stats.records.fetch_add(1, Ordering::Relaxed);
                let n = claim.commit_read();
                stats.bytes_out.fetch_add(n as u64, Ordering::Relaxed);
            }
            None => {
                drop(claim);
                thread::yield_now();
            }
        }
    }
}

fn pump_upstream(
    config: &RelayConfig,
    mut producer: Producer<'_, u8, RELAY_CAPACITY>,
    stats: &RelayStats,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr: SocketAddr = config.bind_addr.parse()?;

    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(EVENTS_CAPACITY);
    let mut listener = TcpListener::bind(addr)?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)?;

    println!("🚀 Spanring relay listening on {}", addr);
    println!(
        "   Buffer: {} KB ({})",
        RELAY_CAPACITY / 1024,
        RelayBuffer::STRATEGY
    );

    let start_time = Instant::now();
    let mut last_stats_print = Instant::now();
    let mut upstream: Option<(TcpStream, SocketAddr)> = None;

    loop {
        match poll.poll(&mut events, Some(Duration::from_millis(100))) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }

        let mut upstream_closed = false;

        for event in events.iter() {
            match event.token() {
                LISTENER => loop {
                    match listener.accept() {
                        Ok((mut stream, peer)) => {
                            if upstream.is_some() {
                                // Satu upstream saja: byte dari dua socket akan tercampur
                                warn!(%peer, "rejecting second upstream");
                                continue;
                            }
                            stream.set_nodelay(true)?;
                            poll.registry()
                                .register(&mut stream, UPSTREAM, Interest::READABLE)?;
                            stats.connections.fetch_add(1, Ordering::Relaxed);
                            info!(%peer, "upstream connected");
                            upstream = Some((stream, peer));
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => return Err(e.into()),
                    }
                },
                UPSTREAM => {
                    if let Some((stream, _)) = upstream.as_mut() {
                        upstream_closed = match drain_socket(stream, &mut producer, stats) {
                            Ok(closed) => closed,
                            Err(e) => {
                                warn!(error = %e, "upstream read error");
                                true
                            }
                        };
                    }
                }
                _ => {}
            }
        }

        if upstream_closed {
            if let Some((mut stream, peer)) = upstream.take() {
                poll.registry().deregister(&mut stream)?;
                info!(%peer, "upstream disconnected");
            }
            if config.once {
                stats.print_stats(start_time.elapsed());
                return Ok(());
            }
        }

        if last_stats_print.elapsed() > config.stats_interval {
            stats.print_stats(start_time.elapsed());
            last_stats_print = Instant::now();
        }
    }
}

fn run_relay(config: RelayConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut buffer = RelayBuffer::new()?;
    let (producer, consumer) = buffer.split();

    let stats = RelayStats::default();
    let finished = AtomicBool::new(false);

    thread::scope(|s| {
        s.spawn(|| parse_records(consumer, &finished, &stats));

        let result = pump_upstream(&config, producer, &stats);
        // Consumer berhenti setelah sisa data habis di-parse
        finished.store(true, Ordering::Release);
        result
    })
}

fn parse_args() -> RelayConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RelayConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    config.bind_addr = args[i + 1].clone();
                    i += 1;
                }
            }
            "--stats-secs" => {
                if i + 1 < args.len() {
                    let secs = args[i + 1].parse().unwrap_or(5);
                    config.stats_interval = Duration::from_secs(secs);
                    i += 1;
                }
            }
            "--once" => {
                config.once = true;
            }
            "--help" | "-h" => {
                println!("Spanring Relay - zero-copy socket receive loop\n");
                println!("Usage: spanring_relay [OPTIONS]\n");
                println!("Options:");
                println!("  -b, --bind <ADDR>       Bind address (default: 0.0.0.0:9999)");
                println!("      --stats-secs <N>    Stats interval in seconds (default: 5)");
                println!("      --once              Exit after the first upstream disconnects");
                println!("  -h, --help              Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("spanring=info,spanring_relay=info")
            }),
        )
        .with_thread_names(true)
        .init();

    let config = parse_args();

    if let Err(e) = run_relay(config) {
        eprintln!("❌ Relay error: {}", e);
        std::process::exit(1);
    }
}
