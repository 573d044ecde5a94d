//! Host capability probe

use crate::region::SharedRegion;

/// Report whether this host can map anonymous shared memory.
///
/// Maps and immediately releases a one-byte region. Keeps no state.
pub fn is_shared_memory_supported() -> bool {
    match SharedRegion::anonymous(1) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "shared memory probe failed");
            false
        }
    }
}
