//! Cooperative cancellation for in-flight workflows.
//!
//! A caller that disconnects mid-write or mid-transfer abandons the
//! operation through this token; the workflows check it between steps and
//! terminate in a well-defined state (a cancelled write reports `Failed`,
//! a cancelled commit keeps already-copied items).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation token shared across tasks. Cancelling any clone cancels
/// all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation; observed by every clone.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation was requested, for use with
    /// `?` at operation entry points.
    pub fn check(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            Err(crate::error::EdidError::Cancelled)
        } else {
            Ok(())
        }
    }
}
