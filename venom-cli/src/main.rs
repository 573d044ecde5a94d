//! venom-ring - command line access to VenomRing shared memory rings
//!
//!   - create:  create a named ring and hold it until told to release it
//!   - push / shift: move bytes through a named byte ring
//!   - inspect: dump cursor state of a named ring
//!   - unlink:  remove a ring name left behind by a crashed creator
//!   - bench:   two-thread throughput run over an anonymous ring
//!
//! `push` and `shift` attach a fresh view each time; do not run two pushes
//! (or two shifts) against the same ring at once, from here or elsewhere.

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use inquire::Confirm;
use std::error::Error;
use std::process;
use std::thread;
use std::time::Instant;
use venom_ring::{
    ClampedU8, Element, ElementKind, RingBacking, RingBuffer, RingConfig, SharedRegion,
};

#[derive(Parser)]
#[command(name = "venom-ring")]
#[command(about = "🐍 VenomRing shared memory ring tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a named ring and keep it alive until confirmed
    Create {
        /// Shared memory name
        name: String,

        /// Capacity in elements
        #[arg(short, long, default_value = "4096")]
        capacity: usize,

        /// Element kind
        #[arg(short, long, value_enum, default_value = "u8")]
        kind: KindArg,
    },

    /// Push bytes into a named byte ring
    Push {
        /// Shared memory name
        name: String,

        /// Byte values (0-255)
        #[arg(required = true)]
        bytes: Vec<u8>,
    },

    /// Shift bytes out of a named byte ring
    Shift {
        /// Shared memory name
        name: String,

        /// Number of bytes to shift
        count: usize,
    },

    /// Show head, tail, flag and sizes of a named ring
    Inspect {
        /// Shared memory name
        name: String,

        /// Element kind the ring was created with
        #[arg(short, long, value_enum, default_value = "u8")]
        kind: KindArg,
    },

    /// Remove a ring name whose creator exited without cleaning up
    Unlink {
        /// Shared memory name
        name: String,
    },

    /// Measure producer/consumer throughput over an anonymous ring
    Bench {
        /// Capacity in bytes
        #[arg(short, long, default_value = "65536")]
        capacity: usize,

        /// Total bytes to stream
        #[arg(short, long, default_value = "268435456")]
        total: usize,

        /// Bytes per push/shift
        #[arg(long, default_value = "1024")]
        chunk: usize,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
enum KindArg {
    U8,
    U8Clamped,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl From<KindArg> for ElementKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::U8 => ElementKind::U8,
            KindArg::U8Clamped => ElementKind::U8Clamped,
            KindArg::I8 => ElementKind::I8,
            KindArg::U16 => ElementKind::U16,
            KindArg::I16 => ElementKind::I16,
            KindArg::U32 => ElementKind::U32,
            KindArg::I32 => ElementKind::I32,
            KindArg::F32 => ElementKind::F32,
            KindArg::F64 => ElementKind::F64,
        }
    }
}

type CliResult = Result<(), Box<dyn Error>>;

/// Run `$body` with `$t` bound to the element type for `$kind`
macro_rules! with_kind {
    ($kind:expr, $t:ident => $body:expr) => {
        match ElementKind::from($kind) {
            ElementKind::U8 => { type $t = u8; $body }
            ElementKind::U8Clamped => { type $t = ClampedU8; $body }
            ElementKind::I8 => { type $t = i8; $body }
            ElementKind::U16 => { type $t = u16; $body }
            ElementKind::I16 => { type $t = i16; $body }
            ElementKind::U32 => { type $t = u32; $body }
            ElementKind::I32 => { type $t = i32; $body }
            ElementKind::F32 => { type $t = f32; $body }
            ElementKind::F64 => { type $t = f64; $body }
        }
    };
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Create { name, capacity, kind } => {
            with_kind!(kind, T => create::<T>(&name, capacity))
        }
        Commands::Push { name, bytes } => push(&name, &bytes),
        Commands::Shift { name, count } => shift(&name, count),
        Commands::Inspect { name, kind } => with_kind!(kind, T => inspect::<T>(&name)),
        Commands::Unlink { name } => unlink(&name),
        Commands::Bench { capacity, total, chunk } => bench(capacity, total, chunk),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("❌").red(), e);
        process::exit(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Named rings
// ═══════════════════════════════════════════════════════════════════════════

fn create<T: Element>(name: &str, capacity: usize) -> CliResult {
    let ring = RingConfig::new(capacity)
        .with_backing(RingBacking::Named(name.to_string()))
        .create::<T>()?;

    println!("{}", style("✅ Ring created").green().bold());
    println!("   Name:     {}", style(name).green());
    println!("   Kind:     {}", style(ring.kind()).green());
    println!("   Capacity: {}", style(ring.capacity()).green());
    println!("   Region:   {}", style(format_size(ring.region().len())).green());
    println!();

    loop {
        let release = Confirm::new("🗑  Release (unlink) the ring and exit?")
            .with_default(false)
            .prompt()
            .unwrap_or(true);
        if release {
            break;
        }
        print_state(&ring);
    }

    Ok(())
}

fn attach<T: Element>(name: &str) -> venom_ring::Result<RingBuffer<T>> {
    let region = SharedRegion::open_named(name)?;
    // SAFETY: each command drives its view from this one thread; not racing
    // another pusher or shifter is the operator's side of the contract
    unsafe { RingBuffer::from_region(region) }
}

fn push(name: &str, bytes: &[u8]) -> CliResult {
    let ring = attach::<u8>(name)?;
    ring.push(bytes)?;
    println!(
        "{} pushed {} bytes, {} available",
        style("✓").green(),
        bytes.len(),
        ring.available_size()
    );
    Ok(())
}

fn shift(name: &str, count: usize) -> CliResult {
    let ring = attach::<u8>(name)?;
    let bytes = ring.shift(count);
    if bytes.len() < count {
        println!(
            "{} only {} of {} bytes stored, nothing shifted",
            style("⚠").yellow(),
            ring.occupied_size(),
            count
        );
        return Ok(());
    }
    println!("{:?}", bytes);
    Ok(())
}

fn inspect<T: Element>(name: &str) -> CliResult {
    let ring = attach::<T>(name)?;
    print_state(&ring);
    Ok(())
}

fn unlink(name: &str) -> CliResult {
    SharedRegion::unlink_named(name)?;
    println!("{} unlinked {}", style("✓").green(), style(name).green());
    Ok(())
}

fn print_state<T: Element>(ring: &RingBuffer<T>) {
    let state = ring.state();
    println!("{}", style("═══════════════════════════════════════════").cyan());
    println!("   Kind:      {}", ring.kind());
    println!("   Capacity:  {}", ring.capacity());
    println!("   Head:      {}", state.head);
    println!("   Tail:      {}", state.tail);
    println!("   Full flag: {}", state.full_flag);
    println!("   Occupied:  {}", style(ring.occupied_size()).green());
    println!("   Available: {}", style(ring.available_size()).green());
    println!("{}", style("═══════════════════════════════════════════").cyan());
}

// ═══════════════════════════════════════════════════════════════════════════
// Benchmark
// ═══════════════════════════════════════════════════════════════════════════

fn bench(capacity: usize, total: usize, chunk: usize) -> CliResult {
    if chunk == 0 || chunk >= capacity {
        let max = capacity.saturating_sub(1);
        return Err(format!("chunk must be between 1 and {max}, got {chunk}").into());
    }

    let (producer, consumer) = RingConfig::new(capacity).create::<u8>()?.split();
    let rounds = total / chunk;

    println!(
        "{} {} rounds of {} through a {} ring",
        style("⏱").cyan(),
        rounds,
        format_size(chunk),
        format_size(capacity)
    );

    let start = Instant::now();

    let tx = thread::spawn(move || {
        let data = vec![0x5Au8; chunk];
        let mut sent = 0;
        while sent < rounds {
            // Never fill completely so the flag stays with the consumer
            if producer.available_size() > chunk && producer.push(&data).is_ok() {
                sent += 1;
            } else {
                core::hint::spin_loop();
            }
        }
    });

    let mut buf = vec![0u8; chunk];
    let mut received = 0;
    while received < rounds {
        if consumer.shift_and_copy(&mut buf) == chunk {
            received += 1;
        } else {
            core::hint::spin_loop();
        }
    }

    tx.join().map_err(|_| "producer thread panicked")?;

    let elapsed = start.elapsed();
    let bytes = (rounds * chunk) as f64;
    println!(
        "{} {} in {:.2?} ({:.1} MB/s)",
        style("✅").green(),
        format_size(rounds * chunk),
        elapsed,
        bytes / elapsed.as_secs_f64() / (1024.0 * 1024.0)
    );

    Ok(())
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 * 1024 { format!("{} MB", bytes / (1024 * 1024)) }
    else if bytes >= 1024 { format!("{} KB", bytes / 1024) }
    else { format!("{} bytes", bytes) }
}
