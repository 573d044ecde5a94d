//! Named Ring Demo (two processes)
//!
//! Terminal 1: cargo run --example named_ring -- producer demo_ring
//! Terminal 2: cargo run --example named_ring -- consumer demo_ring

use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;
use venom_ring::{RingBacking, RingBuffer, RingConfig, SharedRegion};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let role = args.next().unwrap_or_else(|| "producer".to_string());
    let name = args.next().unwrap_or_else(|| "venom_ring_demo".to_string());

    let result = match role.as_str() {
        "producer" => run_producer(&name),
        "consumer" => run_consumer(&name),
        other => {
            eprintln!("Unknown role '{}', expected producer or consumer", other);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("[{}] {}", role, e);
        std::process::exit(1);
    }
}

fn run_producer(name: &str) -> venom_ring::Result<()> {
    let ring = RingConfig::new(4096)
        .with_backing(RingBacking::Named(name.to_string()))
        .create::<u8>()?;

    println!("[Producer] Ring '{}' ready, {} bytes capacity", name, ring.capacity());
    println!("[Producer] Type lines to send, Ctrl+D to quit");

    for line in io::stdin().lock().lines() {
        let line = line.unwrap_or_default();
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');
        match ring.push(&bytes) {
            Ok(()) => println!("[Producer] Sent {} bytes, {} free", bytes.len(), ring.available_size()),
            Err(e) => println!("[Producer] Dropped line: {}", e),
        }
    }

    Ok(())
}

fn run_consumer(name: &str) -> venom_ring::Result<()> {
    // SAFETY: this process only shifts, and the producer process only pushes
    let ring = unsafe { RingBuffer::<u8>::from_region(SharedRegion::open_named(name)?)? };
    println!("[Consumer] Attached to '{}'", name);

    loop {
        let pending = ring.occupied_size();
        if pending == 0 {
            thread::sleep(Duration::from_millis(10));
            continue;
        }
        let bytes = ring.shift(pending);
        print!("{}", String::from_utf8_lossy(&bytes));
    }
}
