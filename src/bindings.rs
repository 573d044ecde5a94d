//! C Bindings for VenomRing
//!
//! Exposes byte (`u8`) rings through opaque handles.
//!
//! A handle may be shared by one thread that pushes and one that shifts.
//! Across all handles of one ring, at most one pushes and one shifts at a
//! time.

use crate::error::RingError;
use crate::factory::{create_ring_buffer, create_ring_buffer_with};
use crate::region::{NamedShm, SharedRegion};
use crate::ring::RingBuffer;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::slice;

/// Push succeeded
pub const VENOM_RING_OK: i32 = 0;
/// Push did not fit in the available space
pub const VENOM_RING_FULL: i32 = -1;
/// Null handle or data pointer
pub const VENOM_RING_INVALID: i32 = -2;

// Opaque handle
pub struct VenomRingHandle(RingBuffer<u8>);

fn into_handle(ring: crate::Result<RingBuffer<u8>>) -> *mut VenomRingHandle {
    match ring {
        Ok(ring) => Box::into_raw(Box::new(VenomRingHandle(ring))),
        Err(_) => ptr::null_mut(),
    }
}

unsafe fn name_arg<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    CStr::from_ptr(name).to_str().ok()
}

/// Create a byte ring in anonymous shared memory
///
/// Returns null if the region cannot be allocated.
#[no_mangle]
pub extern "C" fn venom_ring_create(capacity: usize) -> *mut VenomRingHandle {
    into_handle(create_ring_buffer::<u8>(capacity))
}

/// Create a byte ring in a named shared memory segment
///
/// # Safety
/// name must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn venom_ring_create_named(
    name: *const c_char,
    capacity: usize,
) -> *mut VenomRingHandle {
    match name_arg(name) {
        Some(name) => into_handle(create_ring_buffer_with::<u8, _>(capacity, &NamedShm::new(name))),
        None => ptr::null_mut(),
    }
}

/// Attach to a byte ring created by another process
///
/// # Safety
/// name must be a valid null-terminated string; the new handle must not push
/// while another handle of the ring pushes, nor shift while another shifts
#[no_mangle]
pub unsafe extern "C" fn venom_ring_open_named(name: *const c_char) -> *mut VenomRingHandle {
    match name_arg(name) {
        Some(name) => into_handle(
            SharedRegion::open_named(name).and_then(|region| RingBuffer::from_region(region)),
        ),
        None => ptr::null_mut(),
    }
}

/// Destroy a ring handle
///
/// # Safety
/// handle must come from one of the create/open functions and not be used again
#[no_mangle]
pub unsafe extern "C" fn venom_ring_destroy(handle: *mut VenomRingHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Capacity in bytes, 0 for a null handle
///
/// # Safety
/// handle must be null or a live ring handle
#[no_mangle]
pub unsafe extern "C" fn venom_ring_capacity(handle: *const VenomRingHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.capacity()
}

/// Bytes stored, 0 for a null handle
///
/// # Safety
/// handle must be null or a live ring handle
#[no_mangle]
pub unsafe extern "C" fn venom_ring_occupied(handle: *const VenomRingHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.occupied_size()
}

/// Bytes that can still be pushed, 0 for a null handle
///
/// # Safety
/// handle must be null or a live ring handle
#[no_mangle]
pub unsafe extern "C" fn venom_ring_available(handle: *const VenomRingHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.available_size()
}

/// Push `len` bytes, all or nothing
///
/// Returns `VENOM_RING_OK`, `VENOM_RING_FULL` or `VENOM_RING_INVALID`.
///
/// # Safety
/// handle must be a live ring handle; data must be valid for `len` bytes
#[no_mangle]
pub unsafe extern "C" fn venom_ring_push(
    handle: *const VenomRingHandle,
    data: *const u8,
    len: usize,
) -> i32 {
    if handle.is_null() || (data.is_null() && len > 0) {
        return VENOM_RING_INVALID;
    }
    let input = if len == 0 {
        &[][..]
    } else {
        slice::from_raw_parts(data, len)
    };
    match (*handle).0.push(input) {
        Ok(()) => VENOM_RING_OK,
        Err(RingError::CapacityExceeded { .. }) => VENOM_RING_FULL,
        Err(_) => VENOM_RING_INVALID,
    }
}

/// Shift exactly `len` bytes into `buf`
///
/// Returns `len` on success, 0 if fewer than `len` bytes are stored.
///
/// # Safety
/// handle must be a live ring handle; buf must be valid for `len` bytes
#[no_mangle]
pub unsafe extern "C" fn venom_ring_shift(
    handle: *const VenomRingHandle,
    buf: *mut u8,
    len: usize,
) -> usize {
    if handle.is_null() || buf.is_null() {
        return 0;
    }
    let out = slice::from_raw_parts_mut(buf, len);
    (*handle).0.shift_and_copy(out)
}

/// Get raw pointer to the ring's region (head/tail at offset 0)
///
/// Returns null for a null handle.
///
/// # Safety
/// handle must be null or a live ring handle
#[no_mangle]
pub unsafe extern "C" fn venom_ring_get_shm_ptr(handle: *const VenomRingHandle) -> *mut u8 {
    if handle.is_null() {
        return ptr::null_mut();
    }
    (*handle).0.region().as_ptr()
}

/// Get the ring's region size in bytes, 0 for a null handle
///
/// # Safety
/// handle must be null or a live ring handle
#[no_mangle]
pub unsafe extern "C" fn venom_ring_get_shm_len(handle: *const VenomRingHandle) -> usize {
    if handle.is_null() {
        return 0;
    }
    (*handle).0.region().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_c_api_roundtrip() {
        let handle = venom_ring_create(8);
        assert!(!handle.is_null());

        unsafe {
            assert_eq!(venom_ring_capacity(handle), 8);
            assert_eq!(venom_ring_get_shm_len(handle), 17);

            let data = [1u8, 2, 3, 4, 5];
            assert_eq!(venom_ring_push(handle, data.as_ptr(), data.len()), VENOM_RING_OK);
            assert_eq!(venom_ring_push(handle, data.as_ptr(), data.len()), VENOM_RING_FULL);
            assert_eq!(venom_ring_occupied(handle), 5);
            assert_eq!(venom_ring_available(handle), 3);

            let mut buf = [0u8; 6];
            assert_eq!(venom_ring_shift(handle, buf.as_mut_ptr(), buf.len()), 0);
            assert_eq!(venom_ring_shift(handle, buf.as_mut_ptr(), 5), 5);
            assert_eq!(&buf[..5], &data);

            venom_ring_destroy(handle);
        }
    }

    #[test]
    fn test_c_api_named() {
        let name = CString::new("test_bindings_named").unwrap();
        unsafe {
            let owner = venom_ring_create_named(name.as_ptr(), 4);
            assert!(!owner.is_null());
            assert_eq!(venom_ring_push(owner, [9u8, 8].as_ptr(), 2), VENOM_RING_OK);

            let peer = venom_ring_open_named(name.as_ptr());
            assert!(!peer.is_null());
            assert_eq!(venom_ring_occupied(peer), 2);

            venom_ring_destroy(peer);
            venom_ring_destroy(owner);

            assert!(venom_ring_create_named(ptr::null(), 4).is_null());
        }
    }

    #[test]
    fn test_c_api_null_handle() {
        let null = ptr::null::<VenomRingHandle>();
        unsafe {
            assert_eq!(venom_ring_capacity(null), 0);
            assert_eq!(venom_ring_occupied(null), 0);
            assert_eq!(venom_ring_available(null), 0);
            assert!(venom_ring_get_shm_ptr(null).is_null());
            assert_eq!(venom_ring_get_shm_len(null), 0);
            assert_eq!(venom_ring_push(null, [1u8].as_ptr(), 1), VENOM_RING_INVALID);

            let mut buf = [0u8; 1];
            assert_eq!(venom_ring_shift(null, buf.as_mut_ptr(), 1), 0);
            venom_ring_destroy(ptr::null_mut());
        }
    }
}
