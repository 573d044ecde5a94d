//! Low-level POSIX shared memory operations

use crate::error::{Result, RingError};
use rustix::fd::OwnedFd;
use rustix::fs::ftruncate;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use rustix::shm::{shm_open, shm_unlink, Mode, ShmOFlags};
use std::ffi::CString;
use std::io;
use std::ptr::NonNull;

const VENOM_SHM_PREFIX: &str = "/venom_";
const MAX_NAME_LEN: usize = 255 - VENOM_SHM_PREFIX.len();

/// Handle to a named shared memory segment
pub struct VenomShm {
    #[allow(dead_code)]
    fd: OwnedFd,
    addr: NonNull<u8>,
    size: usize,
    name: String,
    is_owner: bool,
}

// SAFETY: the mapping stays valid until drop; access to its contents is
// coordinated by the ring that sits on top of it
unsafe impl Send for VenomShm {}
unsafe impl Sync for VenomShm {}

fn shm_path(name: &str) -> io::Result<CString> {
    CString::new(format!("{}{}", VENOM_SHM_PREFIX, name))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains a NUL byte"))
}

impl VenomShm {
    /// Create a new shared memory segment of `size` bytes.
    ///
    /// The name is prefixed with `/venom_`. Fails with
    /// [`RingError::ShmCreate`] if a segment of that name already exists; a
    /// stale one can be removed with [`VenomShm::unlink`]. A fresh segment is
    /// zero-filled by the kernel.
    pub fn create(name: &str, size: usize) -> Result<Self> {
        if name.len() > MAX_NAME_LEN {
            return Err(RingError::NamespaceTooLong {
                max: MAX_NAME_LEN,
                got: name.len(),
            });
        }

        let create_err = |source: io::Error| RingError::ShmCreate {
            name: name.to_string(),
            source,
        };

        let c_name = shm_path(name).map_err(create_err)?;
        let fd = shm_open(
            c_name.as_c_str(),
            ShmOFlags::CREATE | ShmOFlags::EXCL | ShmOFlags::RDWR,
            Mode::RUSR | Mode::WUSR | Mode::RGRP | Mode::WGRP,
        )
        .map_err(|e| {
            let source = io::Error::from(e);
            if source.kind() == io::ErrorKind::AlreadyExists {
                tracing::warn!(name, "shared memory segment already exists");
            }
            create_err(source)
        })?;

        // From here on the name is ours; remove it again if setup fails
        let unlink_on_err = |err: RingError| {
            let _ = shm_unlink(c_name.as_c_str());
            err
        };
        ftruncate(&fd, size as u64).map_err(|e| unlink_on_err(RingError::Truncate(e.into())))?;
        let addr = map_shared(&fd, size).map_err(unlink_on_err)?;

        tracing::debug!(name, size, "created shared memory segment");

        Ok(Self {
            fd,
            addr,
            size,
            name: name.to_string(),
            is_owner: true,
        })
    }

    /// Open an existing shared memory segment, mapping its full size
    pub fn open(name: &str) -> Result<Self> {
        let open_err = |source: io::Error| RingError::ShmOpen {
            name: name.to_string(),
            source,
        };

        let c_name = shm_path(name).map_err(open_err)?;
        let fd = shm_open(c_name.as_c_str(), ShmOFlags::RDWR, Mode::empty())
            .map_err(|e| open_err(e.into()))?;

        let stat = rustix::fs::fstat(&fd).map_err(|e| open_err(e.into()))?;
        let size = stat.st_size as usize;
        if size == 0 {
            return Err(open_err(io::Error::new(
                io::ErrorKind::InvalidData,
                "segment is empty",
            )));
        }

        let addr = map_shared(&fd, size)?;

        tracing::debug!(name, size, "opened shared memory segment");

        Ok(Self {
            fd,
            addr,
            size,
            name: name.to_string(),
            is_owner: false,
        })
    }

    /// Remove a segment name left behind by a crashed owner
    pub fn unlink(name: &str) -> Result<()> {
        let c_name = shm_path(name).map_err(|e| RingError::ShmOpen {
            name: name.to_string(),
            source: e,
        })?;
        shm_unlink(c_name.as_c_str()).map_err(|e| RingError::ShmOpen {
            name: name.to_string(),
            source: e.into(),
        })
    }

    /// Get raw pointer to shared memory
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr()
    }

    /// Get size of shared memory segment
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the name of shared memory (without prefix)
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this handle owns (and will unlink) the segment
    #[inline(always)]
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }
}

fn map_shared(fd: &OwnedFd, size: usize) -> Result<NonNull<u8>> {
    let addr = unsafe {
        mmap(
            std::ptr::null_mut(),
            size,
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::SHARED,
            fd,
            0,
        )
        .map_err(|e| RingError::Mmap(e.into()))?
    };

    NonNull::new(addr.cast::<u8>())
        .ok_or_else(|| RingError::Mmap(io::Error::new(io::ErrorKind::Other, "mmap returned null")))
}

impl Drop for VenomShm {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.addr.as_ptr().cast(), self.size);
        }

        if self.is_owner {
            if let Ok(c_name) = shm_path(&self.name) {
                let _ = shm_unlink(c_name.as_c_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_open() {
        let name = "test_shm_create";
        let size = 4096;

        let shm1 = VenomShm::create(name, size).unwrap();
        assert!(shm1.is_owner());
        assert_eq!(shm1.size(), size);

        unsafe {
            std::ptr::write(shm1.as_ptr(), 42u8);
        }

        // Open from another "process"
        let shm2 = VenomShm::open(name).unwrap();
        assert!(!shm2.is_owner());
        assert_eq!(shm2.size(), size);

        let val = unsafe { std::ptr::read(shm2.as_ptr()) };
        assert_eq!(val, 42u8);

        drop(shm2);
        drop(shm1);

        assert!(VenomShm::open(name).is_err());
    }

    #[test]
    fn test_create_refuses_existing_name() {
        let name = "test_shm_exclusive";
        let first = VenomShm::create(name, 64).unwrap();
        unsafe { first.as_ptr().write(7) };

        match VenomShm::create(name, 64) {
            Err(RingError::ShmCreate { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists)
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("second create of the same name succeeded"),
        }

        // The live segment keeps its contents and its name
        let peer = VenomShm::open(name).unwrap();
        assert_eq!(unsafe { peer.as_ptr().read() }, 7);
    }

    #[test]
    fn test_unlink_stale_name() {
        let name = "test_shm_unlink";
        let stale = VenomShm::create(name, 64).unwrap();

        VenomShm::unlink(name).unwrap();
        assert!(VenomShm::open(name).is_err());
        assert!(VenomShm::unlink(name).is_err());

        // The name is free again even while the old mapping lives
        let fresh = VenomShm::create(name, 32).unwrap();
        assert_eq!(fresh.size(), 32);
        drop(fresh);
        drop(stale);
    }

    #[test]
    fn test_name_too_long() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            VenomShm::create(&name, 64),
            Err(RingError::NamespaceTooLong { .. })
        ));
    }
}
