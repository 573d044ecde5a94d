//! Byte layout of a ring region
//!
//! ```text
//! offset 0        4        8                      8+N*w   8+N*w+1
//!        ┌────────┬────────┬──────────────────────┬───────┐
//!        │ head   │ tail   │ data: N × w bytes    │ flag  │
//!        │ u32    │ u32    │ native byte order    │ u8    │
//!        └────────┴────────┴──────────────────────┴───────┘
//! ```
//!
//! Head and tail count elements, not bytes. The flag is the last byte of the
//! region and only matters when head == tail: 0 means empty, anything else
//! means full.

/// Byte offset of the head index
pub const HEAD_OFFSET: usize = 0;

/// Byte offset of the tail index
pub const TAIL_OFFSET: usize = 4;

/// Size of the head/tail index pair
pub const HEAD_TAIL_SIZE: usize = 8;

/// Size of the empty/full flag
pub const FLAG_SIZE: usize = 1;

/// Byte offset where the data zone starts
pub const DATA_OFFSET: usize = HEAD_TAIL_SIZE;

/// Bytes of a region that are not element storage
pub const OVERHEAD: usize = HEAD_TAIL_SIZE + FLAG_SIZE;

/// Largest region a ring may occupy.
///
/// Head and tail are u32 element indices, so no ring may hold more elements
/// than fit in a u32; bounding the byte size keeps that true for every width.
pub const MAX_REGION_BYTES: usize = u32::MAX as usize;

/// Total region size for `element_count` elements of `width` bytes.
///
/// Returns `None` on arithmetic overflow or when the result exceeds
/// [`MAX_REGION_BYTES`].
#[inline]
pub const fn region_len(element_count: usize, width: usize) -> Option<usize> {
    let data = match element_count.checked_mul(width) {
        Some(d) => d,
        None => return None,
    };
    match data.checked_add(OVERHEAD) {
        Some(total) if total <= MAX_REGION_BYTES => Some(total),
        _ => None,
    }
}

/// Element capacity of a region of `len` bytes holding `width`-byte elements.
///
/// Returns `None` if the region is too short to hold a single element.
#[inline]
pub const fn capacity_for(len: usize, width: usize) -> Option<usize> {
    if len < OVERHEAD + width {
        return None;
    }
    Some((len - OVERHEAD) / width)
}

/// Byte offset of the flag in a region of `len` bytes
#[inline(always)]
pub const fn flag_offset(len: usize) -> usize {
    len - FLAG_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_len() {
        assert_eq!(region_len(50, 1), Some(59));
        assert_eq!(region_len(10, 8), Some(89));
        assert_eq!(region_len(10_000_000_000, 1), None);
        assert_eq!(region_len(usize::MAX, 2), None);
    }

    #[test]
    fn test_capacity_for() {
        assert_eq!(capacity_for(59, 1), Some(50));
        assert_eq!(capacity_for(89, 8), Some(10));
        assert_eq!(capacity_for(9, 1), None);
        assert_eq!(capacity_for(16, 8), None);
    }

    #[test]
    fn test_flag_is_last_byte() {
        let len = region_len(7, 4).unwrap();
        assert_eq!(flag_offset(len), DATA_OFFSET + 7 * 4);
    }
}
