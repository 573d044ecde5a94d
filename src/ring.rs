//! Fixed-capacity ring buffer over a shared region
//!
//! The ring is three views into one [`SharedRegion`]: the head/tail index
//! pair at the front, the data zone in the middle and the empty/full flag in
//! the last byte. See [`crate::layout`] for the byte map.
//!
//! # Usage contract
//! One side only pushes, the other only shifts. A [`RingBuffer`] is `Send`
//! but not `Sync`; [`RingBuffer::split`] turns it into a [`RingProducer`]
//! and a [`RingConsumer`] that can live on two threads. Attaching more views
//! with [`RingBuffer::from_region`] is `unsafe` because the type system can
//! no longer see who pushes and who shifts.
//!
//! Cursors are stored with Release and loaded with Acquire, so element bytes
//! written before a head update are visible to a consumer that observes the
//! new head (and likewise for tail). The flag is a separate byte written
//! after the cursor, so a producer that fills the ring completely while the
//! consumer drains it can race on the flag transition; callers that push
//! exactly the available space from one thread while another shifts must
//! coordinate externally.
//!
//! Cursors are re-checked against this view's capacity on every load. A
//! view of another width, a peer process or a stray write can leave them
//! outside the zone; such a ring reads as empty and refuses pushes.

use crate::element::{Element, ElementKind, ElementSlice};
use crate::error::{Result, RingError};
use crate::layout::{self, DATA_OFFSET, HEAD_OFFSET, OVERHEAD, TAIL_OFFSET};
use crate::region::SharedRegion;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

const FLAG_EMPTY: u8 = 0;
const FLAG_FULL: u8 = 1;

const STRAY_CURSOR: &str = "stored cursor lies outside the data zone";

/// Raw cursor state of a ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingState {
    /// Next write position, in elements
    pub head: u32,
    /// Next read position, in elements
    pub tail: u32,
    /// Flag byte is nonzero (full when head == tail)
    pub full_flag: bool,
}

/// Split a run of `len` elements starting at `cursor` in a zone of
/// `capacity` elements into the part before the end of the zone and the part
/// that wraps to the start.
#[inline(always)]
pub(crate) fn split_run(cursor: usize, len: usize, capacity: usize) -> (usize, usize) {
    let to_end = capacity - cursor;
    if len <= to_end {
        (len, 0)
    } else {
        (to_end, len - to_end)
    }
}

/// Ring buffer of `T` elements living in a shared region.
///
/// A handle can move to another thread but cannot be shared by two, so one
/// handle never pushes (or shifts) from two threads at once:
///
/// ```compile_fail
/// use std::sync::Arc;
/// let ring = Arc::new(venom_ring::create_ring_buffer::<u32>(16).unwrap());
/// let other = Arc::clone(&ring);
/// std::thread::spawn(move || other.push(&[7]));
/// ```
pub struct RingBuffer<T: Element> {
    region: SharedRegion,
    data: NonNull<T>,
    capacity: usize,
    _marker: PhantomData<T>,
}

// SAFETY: the handle owns a region reference and plain pointers into it;
// nothing ties it to the creating thread. Not Sync: one handle is driven
// from one thread at a time.
unsafe impl<T: Element> Send for RingBuffer<T> {}

impl<T: Element> RingBuffer<T> {
    /// Build a ring view over an existing region.
    ///
    /// The region's current head, tail and flag are taken as-is, so this is
    /// how a second execution context attaches to a ring created elsewhere.
    /// Structural problems (bad length, cursors outside the data zone) are
    /// rejected.
    ///
    /// # Safety
    ///
    /// Caller must ensure that, for as long as the view lives:
    /// - No other view of the region pushes while this one pushes
    /// - No other view of the region shifts while this one shifts
    ///
    /// This covers views in other threads and in other processes mapping the
    /// same segment. One view pushing while another shifts is the intended
    /// use.
    pub unsafe fn from_region(region: SharedRegion) -> Result<Self> {
        let len = region.len();
        let invalid = |reason: &'static str| RingError::InvalidRegion { len, reason };

        let capacity =
            layout::capacity_for(len, T::WIDTH).ok_or_else(|| invalid("too short for one element"))?;
        if (len - OVERHEAD) % T::WIDTH != 0 {
            return Err(invalid("length is not a whole number of elements plus overhead"));
        }
        if capacity > u32::MAX as usize {
            return Err(invalid("capacity exceeds the u32 index range"));
        }

        let base = region.as_ptr();
        if (base as usize + DATA_OFFSET) % std::mem::align_of::<T>() != 0
            || (base as usize) % std::mem::align_of::<AtomicU32>() != 0
        {
            return Err(invalid("region is not aligned for its element kind"));
        }

        // SAFETY: DATA_OFFSET < len because capacity >= 1
        let data = unsafe { NonNull::new_unchecked(base.add(DATA_OFFSET).cast::<T>()) };

        let ring = Self {
            region,
            data,
            capacity,
            _marker: PhantomData,
        };

        let state = ring.state();
        if ring.cursors().is_none() {
            return Err(invalid(STRAY_CURSOR));
        }

        let kind = T::KIND;
        tracing::debug!(
            %kind,
            capacity,
            head = state.head,
            tail = state.tail,
            "attached ring buffer"
        );

        Ok(ring)
    }

    /// Split into a pushing half and a shifting half over the same region
    pub fn split(self) -> (RingProducer<T>, RingConsumer<T>) {
        let consumer = RingBuffer {
            region: self.region.clone(),
            data: self.data,
            capacity: self.capacity,
            _marker: PhantomData,
        };
        (RingProducer { ring: self }, RingConsumer { ring: consumer })
    }

    /// The backing region, for handing to another execution context
    #[inline]
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    /// Element kind this ring was built for
    #[inline]
    pub fn kind(&self) -> ElementKind {
        T::KIND
    }

    /// Number of elements the ring can hold
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements stored and not yet shifted.
    ///
    /// Reads as 0 while a stored cursor is outside the data zone.
    #[inline]
    pub fn occupied_size(&self) -> usize {
        match self.cursors() {
            Some((head, tail)) => self.occupied_between(head, tail),
            None => 0,
        }
    }

    /// Number of elements that can still be pushed
    #[inline]
    pub fn available_size(&self) -> usize {
        self.capacity - self.occupied_size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied_size() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupied_size() == self.capacity
    }

    /// Snapshot of head, tail and flag
    pub fn state(&self) -> RingState {
        RingState {
            head: self.head_cell().load(Ordering::Acquire),
            tail: self.tail_cell().load(Ordering::Acquire),
            full_flag: self.is_full_flag(),
        }
    }

    /// Append all of `data`, or nothing.
    ///
    /// Fails with [`RingError::CapacityExceeded`] if `data` does not fit in
    /// the available space; the ring is left untouched in that case. Fails
    /// with [`RingError::InvalidRegion`] if a stored cursor is outside the
    /// data zone.
    pub fn push(&self, data: &[T]) -> Result<()> {
        let (head, tail) = match self.cursors() {
            Some(cursors) => cursors,
            None => {
                let state = self.state();
                tracing::warn!(
                    head = state.head,
                    tail = state.tail,
                    capacity = self.capacity,
                    "push refused, cursor outside the data zone"
                );
                return Err(RingError::InvalidRegion {
                    len: self.region.len(),
                    reason: STRAY_CURSOR,
                });
            }
        };

        let available = self.capacity - self.occupied_between(head, tail);
        if data.len() > available {
            return Err(RingError::CapacityExceeded {
                requested: data.len(),
                available,
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        let new_head = self.write(data, head);
        self.set_head(new_head);
        if new_head == self.tail() {
            self.set_full_flag(true);
        }

        tracing::trace!(len = data.len(), head = new_head, "push");
        Ok(())
    }

    /// Append a runtime-tagged slice.
    ///
    /// Fails with [`RingError::KindMismatch`] if the slice holds a different
    /// element kind; values are never converted.
    pub fn push_slice(&self, data: ElementSlice<'_>) -> Result<()> {
        match T::from_element_slice(data) {
            Some(elements) => self.push(elements),
            None => Err(RingError::KindMismatch {
                expected: T::KIND,
                got: data.kind(),
            }),
        }
    }

    /// Remove `count` elements into a new vector.
    ///
    /// Returns an empty vector, without consuming anything, if fewer than
    /// `count` elements are stored.
    pub fn shift(&self, count: usize) -> Vec<T> {
        if count > self.occupied_size() {
            return Vec::new();
        }

        let mut out = vec![T::default(); count];
        if self.shift_and_copy(&mut out) != count {
            return Vec::new();
        }
        out
    }

    /// Remove `out.len()` elements into `out`.
    ///
    /// Returns the number of elements copied: `out.len()` on success, or 0 if
    /// fewer than `out.len()` elements are stored, in which case neither the
    /// ring nor `out` is modified.
    pub fn shift_and_copy(&self, out: &mut [T]) -> usize {
        let (head, tail) = match self.cursors() {
            Some(cursors) => cursors,
            None => return 0,
        };
        if out.is_empty() || out.len() > self.occupied_between(head, tail) {
            return 0;
        }

        let new_tail = self.read(out, tail);
        self.set_tail(new_tail);
        if new_tail == self.head() {
            self.set_full_flag(false);
        }

        tracing::trace!(len = out.len(), tail = new_tail, "shift");
        out.len()
    }

    /// Head and tail, if both index into this view's data zone
    #[inline(always)]
    fn cursors(&self) -> Option<(usize, usize)> {
        let head = self.head();
        let tail = self.tail();
        if head < self.capacity && tail < self.capacity {
            Some((head, tail))
        } else {
            None
        }
    }

    /// Occupancy for cursors already checked by [`Self::cursors`]
    #[inline(always)]
    fn occupied_between(&self, head: usize, tail: usize) -> usize {
        if head == tail {
            return if self.is_full_flag() { self.capacity } else { 0 };
        }

        if head > tail {
            head - tail
        } else {
            self.capacity - (tail - head)
        }
    }

    /// Copy `data` into the zone starting at `start`, returning the new head.
    /// Caller has checked that `start` is in the zone and `data` fits.
    fn write(&self, data: &[T], start: usize) -> usize {
        let (first, rest) = split_run(start, data.len(), self.capacity);
        unsafe {
            let zone = self.data.as_ptr();
            std::ptr::copy_nonoverlapping(data.as_ptr(), zone.add(start), first);
            if rest > 0 {
                std::ptr::copy_nonoverlapping(data.as_ptr().add(first), zone, rest);
            }
        }
        (start + data.len()) % self.capacity
    }

    /// Copy `out.len()` elements from the zone starting at `start`, returning
    /// the new tail. Caller has checked that `start` is in the zone and
    /// enough elements are stored.
    fn read(&self, out: &mut [T], start: usize) -> usize {
        let (first, rest) = split_run(start, out.len(), self.capacity);
        unsafe {
            let zone = self.data.as_ptr();
            std::ptr::copy_nonoverlapping(zone.add(start), out.as_mut_ptr(), first);
            if rest > 0 {
                std::ptr::copy_nonoverlapping(zone, out.as_mut_ptr().add(first), rest);
            }
        }
        (start + out.len()) % self.capacity
    }

    #[inline(always)]
    fn head_cell(&self) -> &AtomicU32 {
        unsafe { &*(self.region.as_ptr().add(HEAD_OFFSET) as *const AtomicU32) }
    }

    #[inline(always)]
    fn tail_cell(&self) -> &AtomicU32 {
        unsafe { &*(self.region.as_ptr().add(TAIL_OFFSET) as *const AtomicU32) }
    }

    #[inline(always)]
    fn flag_cell(&self) -> &AtomicU8 {
        let offset = layout::flag_offset(self.region.len());
        unsafe { &*(self.region.as_ptr().add(offset) as *const AtomicU8) }
    }

    #[inline(always)]
    fn head(&self) -> usize {
        self.head_cell().load(Ordering::Acquire) as usize
    }

    #[inline(always)]
    fn tail(&self) -> usize {
        self.tail_cell().load(Ordering::Acquire) as usize
    }

    #[inline(always)]
    fn set_head(&self, head: usize) {
        self.head_cell().store(head as u32, Ordering::Release);
    }

    #[inline(always)]
    fn set_tail(&self, tail: usize) {
        self.tail_cell().store(tail as u32, Ordering::Release);
    }

    #[inline(always)]
    fn is_full_flag(&self) -> bool {
        self.flag_cell().load(Ordering::Acquire) != FLAG_EMPTY
    }

    #[inline(always)]
    fn set_full_flag(&self, full: bool) {
        let value = if full { FLAG_FULL } else { FLAG_EMPTY };
        self.flag_cell().store(value, Ordering::Release);
    }
}

impl<T: Element> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("kind", &T::KIND)
            .field("capacity", &self.capacity)
            .field("state", &self.state())
            .finish()
    }
}

/// Pushing half of a split ring
pub struct RingProducer<T: Element> {
    ring: RingBuffer<T>,
}

/// Shifting half of a split ring
pub struct RingConsumer<T: Element> {
    ring: RingBuffer<T>,
}

/// Read-only accessors shared by both halves
macro_rules! impl_ring_half {
    ($($half:ident),*) => {
        $(
            impl<T: Element> $half<T> {
                #[inline]
                pub fn region(&self) -> &SharedRegion {
                    self.ring.region()
                }

                #[inline]
                pub fn kind(&self) -> ElementKind {
                    T::KIND
                }

                #[inline]
                pub fn capacity(&self) -> usize {
                    self.ring.capacity()
                }

                #[inline]
                pub fn occupied_size(&self) -> usize {
                    self.ring.occupied_size()
                }

                #[inline]
                pub fn available_size(&self) -> usize {
                    self.ring.available_size()
                }

                #[inline]
                pub fn is_empty(&self) -> bool {
                    self.ring.is_empty()
                }

                #[inline]
                pub fn is_full(&self) -> bool {
                    self.ring.is_full()
                }

                pub fn state(&self) -> RingState {
                    self.ring.state()
                }
            }

            impl<T: Element> fmt::Debug for $half<T> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_tuple(stringify!($half)).field(&self.ring).finish()
                }
            }
        )*
    };
}

impl_ring_half!(RingProducer, RingConsumer);

impl<T: Element> RingProducer<T> {
    /// See [`RingBuffer::push`]
    #[inline]
    pub fn push(&self, data: &[T]) -> Result<()> {
        self.ring.push(data)
    }

    /// See [`RingBuffer::push_slice`]
    #[inline]
    pub fn push_slice(&self, data: ElementSlice<'_>) -> Result<()> {
        self.ring.push_slice(data)
    }
}

impl<T: Element> RingConsumer<T> {
    /// See [`RingBuffer::shift`]
    #[inline]
    pub fn shift(&self, count: usize) -> Vec<T> {
        self.ring.shift(count)
    }

    /// See [`RingBuffer::shift_and_copy`]
    #[inline]
    pub fn shift_and_copy(&self, out: &mut [T]) -> usize {
        self.ring.shift_and_copy(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::region_len;
    use std::thread;

    fn ring<T: Element>(capacity: usize) -> RingBuffer<T> {
        let region = SharedRegion::heap(region_len(capacity, T::WIDTH).unwrap()).unwrap();
        // SAFETY: sole view of a fresh region
        unsafe { RingBuffer::from_region(region) }.unwrap()
    }

    /// Extra view over `ring`'s region, driven from the calling thread only
    fn view<T: Element, U: Element>(ring: &RingBuffer<U>) -> Result<RingBuffer<T>> {
        // SAFETY: tests drive every view from one thread
        unsafe { RingBuffer::from_region(ring.region().clone()) }
    }

    #[test]
    fn test_split_run() {
        assert_eq!(split_run(0, 4, 10), (4, 0));
        assert_eq!(split_run(6, 4, 10), (4, 0));
        assert_eq!(split_run(7, 6, 10), (3, 3));
        assert_eq!(split_run(9, 10, 10), (1, 9));
    }

    #[test]
    fn test_empty_at_birth() {
        let ring = ring::<u8>(16);
        assert_eq!(ring.capacity(), 16);
        assert_eq!(ring.occupied_size(), 0);
        assert_eq!(ring.available_size(), 16);
        assert!(ring.is_empty());
        assert_eq!(
            ring.state(),
            RingState {
                head: 0,
                tail: 0,
                full_flag: false
            }
        );
    }

    #[test]
    fn test_fill_exactly_sets_flag() {
        let ring = ring::<u16>(4);
        ring.push(&[1, 2, 3, 4]).unwrap();
        assert!(ring.is_full());
        assert_eq!(ring.state().head, 0);
        assert!(ring.state().full_flag);

        assert_eq!(ring.shift(4), vec![1, 2, 3, 4]);
        assert!(ring.is_empty());
        assert!(!ring.state().full_flag);
    }

    #[test]
    fn test_push_to_zone_end_does_not_split() {
        let ring = ring::<u8>(10);
        ring.push(&[0; 6]).unwrap();
        assert_eq!(ring.shift(6).len(), 6);

        // head = 6, run ends exactly at the zone boundary
        ring.push(&[1, 2, 3, 4]).unwrap();
        assert_eq!(ring.state().head, 0);
        assert_eq!(ring.occupied_size(), 4);
        assert_eq!(ring.shift(4), vec![1, 2, 3, 4]);
        assert_eq!(ring.state().tail, 0);
    }

    #[test]
    fn test_split_write_lands_at_zone_start() {
        let ring = ring::<u8>(10);
        ring.push(&[0; 8]).unwrap();
        assert_eq!(ring.shift(8).len(), 8);

        ring.push(&[1, 2, 3, 4, 5]).unwrap();
        let bytes = ring.region().to_vec();
        assert_eq!(&bytes[DATA_OFFSET + 8..DATA_OFFSET + 10], &[1, 2]);
        assert_eq!(&bytes[DATA_OFFSET..DATA_OFFSET + 3], &[3, 4, 5]);
        assert_eq!(ring.state().head, 3);
    }

    #[test]
    fn test_empty_push_and_shift_are_noops() {
        let ring = ring::<u8>(4);
        ring.push(&[]).unwrap();
        assert_eq!(ring.occupied_size(), 0);
        assert!(!ring.state().full_flag);

        ring.push(&[1, 2, 3, 4]).unwrap();
        assert_eq!(ring.shift_and_copy(&mut []), 0);
        assert!(ring.is_full());
    }

    #[test]
    fn test_shift_and_copy_underflow_leaves_output() {
        let ring = ring::<i32>(8);
        ring.push(&[-1, -2]).unwrap();

        let mut out = [7i32; 3];
        assert_eq!(ring.shift_and_copy(&mut out), 0);
        assert_eq!(out, [7, 7, 7]);
        assert_eq!(ring.occupied_size(), 2);

        let mut out = [0i32; 2];
        assert_eq!(ring.shift_and_copy(&mut out), 2);
        assert_eq!(out, [-1, -2]);
    }

    #[test]
    fn test_push_slice_kind_mismatch() {
        let ring = ring::<f32>(8);
        let wrong = [1.0f64, 2.0];
        let err = ring.push_slice(ElementSlice::from(&wrong[..])).unwrap_err();
        assert!(matches!(
            err,
            RingError::KindMismatch {
                expected: ElementKind::F32,
                got: ElementKind::F64
            }
        ));
        assert_eq!(ring.occupied_size(), 0);

        let right = [1.5f32, 2.5];
        ring.push_slice(ElementSlice::from(&right[..])).unwrap();
        assert_eq!(ring.shift(2), vec![1.5, 2.5]);
    }

    #[test]
    fn test_from_region_rejects_bad_layouts() {
        let short = SharedRegion::heap(9).unwrap();
        assert!(matches!(
            unsafe { RingBuffer::<u8>::from_region(short) },
            Err(RingError::InvalidRegion { len: 9, .. })
        ));

        // 9 + 10 bytes is not a whole number of u32 elements
        let ragged = SharedRegion::heap(19).unwrap();
        assert!(matches!(
            unsafe { RingBuffer::<u32>::from_region(ragged) },
            Err(RingError::InvalidRegion { .. })
        ));

        let corrupt = SharedRegion::heap(region_len(4, 1).unwrap()).unwrap();
        unsafe { (corrupt.as_ptr() as *mut u32).write(4) };
        assert!(matches!(
            unsafe { RingBuffer::<u8>::from_region(corrupt) },
            Err(RingError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn test_second_view_sees_state() {
        let producer = ring::<u32>(8);
        producer.push(&[10, 20, 30]).unwrap();

        let consumer = view::<u32, _>(&producer).unwrap();
        assert_eq!(consumer.occupied_size(), 3);
        assert_eq!(consumer.shift(2), vec![10, 20]);
        assert_eq!(producer.occupied_size(), 1);
        assert_eq!(producer.available_size(), 7);
    }

    #[test]
    fn test_wider_view_never_leaves_its_zone() {
        let bytes = ring::<u8>(80);
        assert_eq!(bytes.region().len(), 89);

        let floats = view::<f64, _>(&bytes).unwrap();
        assert_eq!(floats.capacity(), 10);

        // head = 50 is fine for the byte view, past the end for the f64 one
        bytes.push(&[1; 50]).unwrap();
        assert_eq!(floats.state().head, 50);
        assert_eq!(floats.occupied_size(), 0);
        assert_eq!(floats.available_size(), 10);
        assert!(floats.is_empty());

        assert!(matches!(
            floats.push(&[1.0]),
            Err(RingError::InvalidRegion { len: 89, .. })
        ));
        assert!(matches!(
            floats.push_slice(ElementSlice::from(&[2.0f64][..])),
            Err(RingError::InvalidRegion { .. })
        ));
        assert!(floats.shift(1).is_empty());
        let mut out = [9.0f64; 2];
        assert_eq!(floats.shift_and_copy(&mut out), 0);
        assert_eq!(out, [9.0, 9.0]);

        // The byte view is untouched by the refused operations
        assert_eq!(bytes.state().head, 50);
        assert_eq!(bytes.state().tail, 0);
        assert_eq!(bytes.shift(50), vec![1; 50]);
    }

    #[test]
    fn test_split_halves_share_state() {
        let (producer, consumer) = ring::<i16>(6).split();
        assert!(producer.region().ptr_eq(consumer.region()));
        assert_eq!(consumer.kind(), ElementKind::I16);

        producer.push(&[-1, -2, -3, -4]).unwrap();
        assert_eq!(consumer.occupied_size(), 4);
        assert_eq!(consumer.shift(3), vec![-1, -2, -3]);
        assert_eq!(producer.available_size(), 5);

        producer.push(&[5, 6, 7, 8, 9]).unwrap();
        assert!(consumer.is_full());
        assert_eq!(consumer.shift(6), vec![-4, 5, 6, 7, 8, 9]);
        assert!(producer.is_empty());
    }

    #[test]
    fn test_spsc_threads() {
        const TOTAL: u32 = 100_000;
        const CHUNK: usize = 7;

        let (producer, consumer) = ring::<u32>(64).split();

        let tx = thread::spawn(move || {
            let mut next = 0u32;
            while next < TOTAL {
                let len = CHUNK.min((TOTAL - next) as usize);
                // Never fill the ring completely; see the usage contract
                if producer.available_size() <= len {
                    thread::yield_now();
                    continue;
                }
                let chunk: Vec<u32> = (next..next + len as u32).collect();
                producer.push(&chunk).unwrap();
                next += len as u32;
            }
        });

        let mut expected = 0u32;
        let mut buf = [0u32; 16];
        while expected < TOTAL {
            let n = consumer.occupied_size().min(buf.len());
            if n == 0 {
                thread::yield_now();
                continue;
            }
            assert_eq!(consumer.shift_and_copy(&mut buf[..n]), n);
            for &value in &buf[..n] {
                assert_eq!(value, expected);
                expected += 1;
            }
        }

        tx.join().unwrap();
        assert!(consumer.is_empty());
    }
}
