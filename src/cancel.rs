//! Cooperative cancellation.
//!
//! Workers never block on cancellation; they poll a shared flag at coarse
//! checkpoints (before parsing a file, before resolving each inclusion)
//! and raise [`ScanError::Interrupted`] carrying the operation name and
//! the file in hand. The checkpoint takes the operation as a `&'static
//! str` so the hot path formats nothing unless cancellation actually
//! fired.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ScanError;

/// Shared cancellation flag, cloneable across threads.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Monotonic: once set, never cleared.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Checkpoint: raises `Interrupted` if cancellation was requested.
    #[inline]
    pub fn check(&self, op: &'static str, what: &Path) -> Result<(), ScanError> {
        if self.is_cancelled() {
            return Err(ScanError::Interrupted {
                op,
                what: what.display().to_string(),
            });
        }
        Ok(())
    }
}
