//! Error types for VenomRing

use crate::element::ElementKind;
use std::io;
use thiserror::Error;

/// Result type for VenomRing operations
pub type Result<T> = std::result::Result<T, RingError>;

/// Errors that can occur in VenomRing operations
#[derive(Debug, Error)]
pub enum RingError {
    /// Backing region could not be allocated (too large or out of memory)
    #[error("Failed to allocate ring region of {size} bytes: {source}")]
    Alloc {
        size: usize,
        #[source]
        source: io::Error,
    },

    /// Requested element capacity is not usable
    #[error("Invalid ring capacity: {0} elements")]
    InvalidCapacity(usize),

    /// Push called with elements of another kind than the ring was built for
    #[error("Element kind mismatch on push: ring holds {expected}, got {got}")]
    KindMismatch {
        expected: ElementKind,
        got: ElementKind,
    },

    /// Push would not fit in the remaining space
    #[error("Not enough available space in ring: requested {requested}, available {available}")]
    CapacityExceeded { requested: usize, available: usize },

    /// An existing region does not describe a valid ring
    #[error("Invalid ring region of {len} bytes: {reason}")]
    InvalidRegion { len: usize, reason: &'static str },

    /// Failed to create shared memory
    #[error("Failed to create shared memory '{name}': {source}")]
    ShmCreate {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to open shared memory
    #[error("Failed to open shared memory '{name}': {source}")]
    ShmOpen {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to map memory
    #[error("Failed to map memory: {0}")]
    Mmap(#[source] io::Error),

    /// Failed to truncate shared memory
    #[error("Failed to set shared memory size: {0}")]
    Truncate(#[source] io::Error),

    /// Namespace too long
    #[error("Namespace too long: max {max} chars, got {got}")]
    NamespaceTooLong { max: usize, got: usize },
}
