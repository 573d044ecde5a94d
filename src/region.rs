//! Shared backing regions and the allocators that produce them
//!
//! A [`SharedRegion`] is a reference-counted handle to one contiguous block
//! of memory. Cloning it shares the same bytes; it never copies them. This is
//! how a ring is handed to another thread: clone the region, move the clone,
//! and build a second [`RingBuffer`](crate::RingBuffer) view over it.

use crate::error::{Result, RingError};
use crate::shm::VenomShm;
use rustix::mm::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::fmt;
use std::io;
use std::ptr::NonNull;
use std::sync::Arc;

/// Alignment of heap-backed regions
const HEAP_ALIGN: usize = 64;

/// Where a region's memory came from
enum Backing {
    /// `MAP_SHARED | MAP_ANONYMOUS` mapping
    Anonymous,
    /// Zeroed heap allocation
    Heap(Layout),
    /// Named POSIX shared memory segment
    Named(VenomShm),
}

struct Mapping {
    addr: NonNull<u8>,
    len: usize,
    backing: Backing,
}

// SAFETY: the memory is valid until the last handle drops; concurrent access
// to the bytes goes through the ring's atomic cursors
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Drop for Mapping {
    fn drop(&mut self) {
        match &self.backing {
            Backing::Anonymous => unsafe {
                let _ = munmap(self.addr.as_ptr().cast(), self.len);
            },
            Backing::Heap(layout) => unsafe {
                dealloc(self.addr.as_ptr(), *layout);
            },
            // VenomShm unmaps (and unlinks if owner) on its own drop
            Backing::Named(_) => {}
        }
    }
}

/// Shared handle to a contiguous memory region
#[derive(Clone)]
pub struct SharedRegion {
    inner: Arc<Mapping>,
}

impl SharedRegion {
    /// Map a zeroed anonymous shared region of `len` bytes
    pub fn anonymous(len: usize) -> Result<Self> {
        let alloc_err = |source: io::Error| RingError::Alloc { size: len, source };
        if len == 0 {
            return Err(alloc_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "region size must be > 0",
            )));
        }

        let addr = unsafe {
            mmap_anonymous(
                std::ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
            )
            .map_err(|e| alloc_err(e.into()))?
        };
        let addr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| alloc_err(io::Error::new(io::ErrorKind::Other, "mmap returned null")))?;

        tracing::debug!(len, "mapped anonymous shared region");

        Ok(Self::from_mapping(Mapping {
            addr,
            len,
            backing: Backing::Anonymous,
        }))
    }

    /// Allocate a zeroed, 64-byte aligned heap region of `len` bytes
    pub fn heap(len: usize) -> Result<Self> {
        let alloc_err = |source: io::Error| RingError::Alloc { size: len, source };
        if len == 0 {
            return Err(alloc_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "region size must be > 0",
            )));
        }

        let layout = Layout::from_size_align(len, HEAP_ALIGN)
            .map_err(|e| alloc_err(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let ptr = unsafe { alloc_zeroed(layout) };
        let addr = NonNull::new(ptr).ok_or_else(|| {
            alloc_err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "heap allocation failed",
            ))
        })?;

        Ok(Self::from_mapping(Mapping {
            addr,
            len,
            backing: Backing::Heap(layout),
        }))
    }

    /// Create a named POSIX shared memory region of `len` bytes.
    ///
    /// The segment is unlinked when the last handle to it in this process
    /// drops.
    pub fn create_named(name: &str, len: usize) -> Result<Self> {
        let shm = VenomShm::create(name, len)?;
        Ok(Self::from_shm(shm))
    }

    /// Open a named region created by another process
    pub fn open_named(name: &str) -> Result<Self> {
        let shm = VenomShm::open(name)?;
        Ok(Self::from_shm(shm))
    }

    fn from_shm(shm: VenomShm) -> Self {
        // SAFETY: mmap never hands back a null mapping on success
        let addr = unsafe { NonNull::new_unchecked(shm.as_ptr()) };
        let len = shm.size();
        Self::from_mapping(Mapping {
            addr,
            len,
            backing: Backing::Named(shm),
        })
    }

    fn from_mapping(mapping: Mapping) -> Self {
        Self {
            inner: Arc::new(mapping),
        }
    }

    /// Base pointer of the region
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u8 {
        self.inner.addr.as_ptr()
    }

    /// Size of the region in bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Segment name, for regions backed by named shared memory
    pub fn name(&self) -> Option<&str> {
        match &self.inner.backing {
            Backing::Named(shm) => Some(shm.name()),
            _ => None,
        }
    }

    /// True if both handles refer to the same memory
    pub fn ptr_eq(&self, other: &SharedRegion) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles to this region in this process
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Remove a segment name left behind by a crashed owner
    pub fn unlink_named(name: &str) -> Result<()> {
        VenomShm::unlink(name)
    }

    /// Copy the region's current bytes out
    #[cfg(test)]
    pub(crate) fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.len()];
        unsafe {
            std::ptr::copy_nonoverlapping(self.as_ptr(), out.as_mut_ptr(), self.len());
        }
        out
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = match &self.inner.backing {
            Backing::Anonymous => "anonymous",
            Backing::Heap(_) => "heap",
            Backing::Named(_) => "named",
        };
        f.debug_struct("SharedRegion")
            .field("backing", &backing)
            .field("len", &self.len())
            .field("name", &self.name())
            .finish()
    }
}

/// Source of backing regions for new rings
pub trait RegionAllocator {
    /// Allocate a zeroed region of exactly `len` bytes
    fn allocate(&self, len: usize) -> Result<SharedRegion>;
}

/// Anonymous shared mappings, visible to every thread and to forked children
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousShm;

impl RegionAllocator for AnonymousShm {
    fn allocate(&self, len: usize) -> Result<SharedRegion> {
        SharedRegion::anonymous(len)
    }
}

/// Plain heap memory, for single-process use
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl RegionAllocator for HeapAllocator {
    fn allocate(&self, len: usize) -> Result<SharedRegion> {
        SharedRegion::heap(len)
    }
}

/// Named POSIX shared memory, reachable from other processes by name
#[derive(Debug, Clone)]
pub struct NamedShm {
    name: String,
}

impl NamedShm {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RegionAllocator for NamedShm {
    fn allocate(&self, len: usize) -> Result<SharedRegion> {
        SharedRegion::create_named(&self.name, len)
    }
}

impl<A: RegionAllocator + ?Sized> RegionAllocator for &A {
    fn allocate(&self, len: usize) -> Result<SharedRegion> {
        (**self).allocate(len)
    }
}
