//! Trailing-edge debouncing.
//!
//! Every [`Debouncer::trigger`] restarts the timer; only the action from the
//! last trigger of a burst runs, once the delay has passed without another
//! trigger. Scrolling widgets use this to turn a flurry of scroll events into
//! a single row fetch.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::trace;

// ============================================================================
// Constants
// ============================================================================

/// Default quiet period.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(250);

// ============================================================================
// Debouncer
// ============================================================================

/// Coalesces bursts of triggers into one action.
///
/// An action that has started running is never interrupted by a later
/// trigger or by [`Debouncer::cancel`].
#[derive(Debug)]
pub struct Debouncer {
    /// Quiet period.
    delay: Duration,
    /// Bumped by every trigger and cancel; a timer only fires if it still
    /// holds the latest value.
    generation: Arc<AtomicU64>,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_DELAY)
    }
}

impl Debouncer {
    /// Creates a debouncer with the given quiet period.
    #[inline]
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the quiet period.
    #[inline]
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restarts the timer; `action` runs once it expires, unless another
    /// trigger or a cancel comes first.
    ///
    /// Must be called within a Tokio runtime.
    pub fn trigger<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) != mine {
                trace!(generation = mine, "Debounced action superseded");
                return;
            }
            action().await;
        });
    }

    /// Drops the pending action, if any.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
