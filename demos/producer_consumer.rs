//! Producer/Consumer Demo
//!
//! Streams f32 samples from one thread to another through a single ring.
//! The producer never fills the ring completely, so the two sides only meet
//! through the head and tail cursors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;
use venom_ring::create_ring_buffer;

const CAPACITY: usize = 4096;
const CHUNK: usize = 256;
const TOTAL_SAMPLES: usize = 10_000_000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("╔══════════════════════════════════════════════════╗");
    println!("║       VenomRing Producer/Consumer Demo           ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    let ring = match create_ring_buffer::<f32>(CAPACITY) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[Demo] Failed to create ring: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "[Demo] Ring: {} x f32 ({} bytes region)",
        ring.capacity(),
        ring.region().len()
    );

    let (ring, consumer_ring) = ring.split();

    let start = Arc::new(Barrier::new(2));
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let start = Arc::clone(&start);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut chunk = [0.0f32; CHUNK];
            let mut sent = 0usize;
            start.wait();

            while sent < TOTAL_SAMPLES {
                if ring.available_size() <= CHUNK {
                    core::hint::spin_loop();
                    continue;
                }
                for (i, sample) in chunk.iter_mut().enumerate() {
                    *sample = ((sent + i) as f32 * 0.01).sin();
                }
                // Space was checked above and only the consumer frees more
                if ring.push(&chunk).is_ok() {
                    sent += CHUNK;
                }
            }
            done.store(true, Ordering::Release);
        })
    };

    let consumer = thread::spawn(move || {
        let mut buf = [0.0f32; CHUNK];
        let mut received = 0usize;
        let mut sum = 0.0f64;
        start.wait();
        let begin = Instant::now();

        loop {
            if consumer_ring.shift_and_copy(&mut buf) == CHUNK {
                received += CHUNK;
                sum += buf.iter().map(|&s| s as f64).sum::<f64>();
                continue;
            }
            if done.load(Ordering::Acquire) && consumer_ring.occupied_size() < CHUNK {
                break;
            }
            core::hint::spin_loop();
        }

        (received, sum, begin.elapsed())
    });

    producer.join().expect("producer panicked");
    let (received, sum, elapsed) = consumer.join().expect("consumer panicked");

    let rate = received as f64 / elapsed.as_secs_f64();
    println!("[Demo] Received {} samples in {:.2?}", received, elapsed);
    println!("[Demo] Throughput: {:.1} M samples/s", rate / 1e6);
    println!("[Demo] Checksum: {:.6}", sum);
}
