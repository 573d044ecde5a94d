//! Ring construction: sizing, allocation and configuration

use crate::element::Element;
use crate::error::{Result, RingError};
use crate::layout::{self, MAX_REGION_BYTES};
use crate::region::{AnonymousShm, HeapAllocator, NamedShm, RegionAllocator};
use crate::ring::RingBuffer;
use std::io;

/// Default ring capacity in elements (64K)
const DEFAULT_ELEMENT_COUNT: usize = 64 * 1024;

/// Create a ring of `element_count` elements in anonymous shared memory.
///
/// The region is `element_count * size_of::<T>() + 9` bytes and starts
/// zeroed, so the ring is empty.
pub fn create_ring_buffer<T: Element>(element_count: usize) -> Result<RingBuffer<T>> {
    create_ring_buffer_with(element_count, &AnonymousShm)
}

/// Create a ring of `element_count` elements in a region from `allocator`.
///
/// Fails with [`RingError::Alloc`] when the region would exceed
/// [`MAX_REGION_BYTES`] or the allocator cannot reserve it.
pub fn create_ring_buffer_with<T, A>(element_count: usize, allocator: &A) -> Result<RingBuffer<T>>
where
    T: Element,
    A: RegionAllocator + ?Sized,
{
    if element_count == 0 {
        return Err(RingError::InvalidCapacity(element_count));
    }

    let size = match layout::region_len(element_count, T::WIDTH) {
        Some(size) => size,
        None => {
            let size = element_count
                .saturating_mul(T::WIDTH)
                .saturating_add(layout::OVERHEAD);
            tracing::warn!(element_count, size, "ring region too large");
            return Err(RingError::Alloc {
                size,
                source: io::Error::new(
                    io::ErrorKind::OutOfMemory,
                    format!("exceeds maximum shared region size of {MAX_REGION_BYTES} bytes"),
                ),
            });
        }
    };

    let region = allocator.allocate(size).map_err(|e| {
        tracing::warn!(size, error = %e, "ring region allocation failed");
        e
    })?;
    if region.len() != size {
        tracing::warn!(size, got = region.len(), "allocator returned a region of the wrong size");
        return Err(RingError::Alloc {
            size,
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("allocator returned {} bytes", region.len()),
            ),
        });
    }

    let kind = T::KIND;
    tracing::debug!(%kind, element_count, size, "created ring buffer");

    // SAFETY: the region is fresh, so the new ring is its only view
    unsafe { RingBuffer::from_region(region) }
}

/// Which allocator backs a configured ring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RingBacking {
    /// Anonymous shared mapping
    #[default]
    Anonymous,
    /// Process-private heap memory
    Heap,
    /// Named POSIX shared memory segment
    Named(String),
}

/// Ring configuration
#[derive(Debug, Clone)]
pub struct RingConfig {
    /// Capacity in elements
    pub element_count: usize,
    /// Where the region comes from
    pub backing: RingBacking,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            element_count: DEFAULT_ELEMENT_COUNT,
            backing: RingBacking::default(),
        }
    }
}

impl RingConfig {
    pub fn new(element_count: usize) -> Self {
        Self {
            element_count,
            ..Self::default()
        }
    }

    pub fn with_backing(mut self, backing: RingBacking) -> Self {
        self.backing = backing;
        self
    }

    /// Region size in bytes this configuration needs for `T`
    pub fn region_len<T: Element>(&self) -> Option<usize> {
        layout::region_len(self.element_count, T::WIDTH)
    }

    /// Create a ring as configured
    pub fn create<T: Element>(&self) -> Result<RingBuffer<T>> {
        match &self.backing {
            RingBacking::Anonymous => create_ring_buffer_with(self.element_count, &AnonymousShm),
            RingBacking::Heap => create_ring_buffer_with(self.element_count, &HeapAllocator),
            RingBacking::Named(name) => {
                create_ring_buffer_with(self.element_count, &NamedShm::new(name.as_str()))
            }
        }
    }
}
