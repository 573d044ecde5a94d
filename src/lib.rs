//! VenomRing - Fixed-capacity ring buffer in shared memory
//!
//! A ring of fixed-width numeric elements laid out in one contiguous region
//! so that a producer and a consumer in different execution contexts can
//! stream through the same bytes.
//!
//! # Layout
//!
//! - **Head/tail** (8 bytes): u32 write and read cursors, in elements
//! - **Data zone** (N × width bytes): the elements
//! - **Flag** (1 byte): tells full from empty when head == tail
//!
//! # Usage
//!
//! ```no_run
//! use venom_ring::create_ring_buffer;
//!
//! let (producer, consumer) = create_ring_buffer::<u8>(1024)?.split();
//! producer.push(&[1, 2, 3])?;
//!
//! // The consumer half can move to another thread
//! let shifted = std::thread::spawn(move || consumer.shift(3)).join().unwrap();
//! assert_eq!(shifted, vec![1, 2, 3]);
//! # Ok::<(), venom_ring::RingError>(())
//! ```

pub mod error;
pub mod layout;
pub mod element;
pub mod shm;
pub mod region;
pub mod ring;
pub mod factory;
pub mod support;
pub mod bindings;

pub use error::{RingError, Result};
pub use element::{ClampedU8, Element, ElementKind, ElementSlice};
pub use region::{AnonymousShm, HeapAllocator, NamedShm, RegionAllocator, SharedRegion};
pub use ring::{RingBuffer, RingConsumer, RingProducer, RingState};
pub use factory::{create_ring_buffer, create_ring_buffer_with, RingBacking, RingConfig};
pub use support::is_shared_memory_supported;
