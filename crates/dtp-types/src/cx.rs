//! Cooperative cancellation context.
//!
//! A [`Cx`] is threaded through every search. Cancellation is only observed
//! at [`Cx::checkpoint`], which the engine calls between oracle evaluations
//! and never while one is running: a half-finished test run leaves shared
//! state in an unknown configuration.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable cancellation handle. Clones share one flag, so a signal
/// handler or another thread can hold a clone and call [`Cx::cancel`].
#[derive(Clone, Default)]
pub struct Cx {
    cancelled: Arc<AtomicBool>,
}

/// Returned by [`Cx::checkpoint`] once cancellation has been requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelRequested;

impl fmt::Display for CancelRequested {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cancellation requested")
    }
}

impl std::error::Error for CancelRequested {}

impl Cx {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancellation point.
    ///
    /// # Errors
    ///
    /// Returns [`CancelRequested`] once [`Cx::cancel`] has been called on
    /// this context or any clone of it.
    pub fn checkpoint(&self) -> Result<(), CancelRequested> {
        if self.is_cancel_requested() {
            Err(CancelRequested)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Cx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cx")
            .field("cancelled", &self.is_cancel_requested())
            .finish()
    }
}
