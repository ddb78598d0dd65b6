//! Cooperative cancellation.

use crate::errors::{AnalysisError, AnalysisResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, polled by the engine between block visits.
///
/// Clones share the same flag, so one clone can be handed to another thread
/// to abort a running session.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// # Errors
    ///
    /// Returns [`AnalysisError::Cancelled`] once [`CancellationToken::cancel`]
    /// has been called on this token or on one of its clones.
    #[inline]
    pub fn check(&self) -> AnalysisResult<()> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}
