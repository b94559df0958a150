//! Correlation of outbound calls with their replies.
//!
//! Every locally issued call reserves a fresh [`CorrelationId`] and parks a
//! oneshot sender here. The matching `respond` envelope removes the entry
//! and settles the caller's [`PendingCall`]; a disconnect rejects all of
//! them. Removal is a single map operation, so an id is never half-settled
//! even when a reply handler issues new calls re-entrantly.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;

// ============================================================================
// Types
// ============================================================================

/// Map of correlation IDs to reply channels.
type CorrelationMap = FxHashMap<CorrelationId, oneshot::Sender<Result<Value>>>;

// ============================================================================
// CallCorrelator
// ============================================================================

/// Outstanding locally issued calls.
#[derive(Debug, Default)]
pub struct CallCorrelator {
    /// Number of ids handed out so far.
    counter: AtomicU64,
    /// Calls still waiting for a reply.
    pending: Mutex<CorrelationMap>,
}

impl CallCorrelator {
    /// Creates an empty correlator.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a fresh id and registers a pending call under it.
    #[must_use]
    pub fn reserve(&self) -> PendingCall {
        let id = CorrelationId::local(self.counter.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);
        trace!(correlation_id = %id, "Call registered");
        PendingCall::waiting(id, rx)
    }

    /// Settles the call `id` with the peer's reply.
    ///
    /// Returns `false` if no such call is pending (already settled, rejected
    /// or never issued); the reply is then ignored.
    pub fn settle(&self, id: &CorrelationId, success: bool, value: Value) -> bool {
        let Some(tx) = self.pending.lock().remove(id) else {
            return false;
        };

        let outcome = if success {
            Ok(value)
        } else {
            Err(Error::remote(value))
        };
        // The caller may have dropped its PendingCall; that is not an error.
        let _ = tx.send(outcome);
        trace!(correlation_id = %id, success, "Call settled");
        true
    }

    /// Removes a call without settling it.
    ///
    /// Its [`PendingCall`] then resolves to [`Error::ConnectionLost`].
    pub fn forget(&self, id: &CorrelationId) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    /// Rejects every pending call with [`Error::ConnectionLost`].
    ///
    /// Returns how many calls were rejected.
    pub fn reject_all(&self, reason: &str) -> usize {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::connection_lost(reason)));
        }

        if count > 0 {
            debug!(count, reason, "Rejected pending calls");
        }
        count
    }

    /// Returns the number of calls waiting for a reply.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if no call is waiting.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Returns `true` if `id` is waiting for a reply.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.pending.lock().contains_key(id)
    }
}

// ============================================================================
// PendingCall
// ============================================================================

/// Future result of a remote call.
///
/// Resolves exactly once: with the returned value, with
/// [`Error::RemoteInvocation`] carrying the peer's error, or with
/// [`Error::ConnectionLost`].
#[must_use = "a remote call's result is only observable by awaiting it"]
#[derive(Debug)]
pub struct PendingCall {
    /// Correlation id, absent for calls refused before being issued.
    id: Option<CorrelationId>,
    /// Settlement state.
    state: PendingState,
}

#[derive(Debug)]
enum PendingState {
    /// Waiting for the correlator to settle.
    Waiting(oneshot::Receiver<Result<Value>>),
    /// Failed before anything was sent.
    Failed(Option<Error>),
}

impl PendingCall {
    fn waiting(id: CorrelationId, rx: oneshot::Receiver<Result<Value>>) -> Self {
        Self {
            id: Some(id),
            state: PendingState::Waiting(rx),
        }
    }

    /// A call that failed before it was issued.
    pub(crate) fn failed(error: Error) -> Self {
        Self {
            id: None,
            state: PendingState::Failed(Some(error)),
        }
    }

    /// Returns the correlation id, if the call was issued.
    #[inline]
    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.id.as_ref()
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            PendingState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => {
                    Poll::Ready(Err(Error::connection_lost("call abandoned before reply")))
                }
                Poll::Pending => Poll::Pending,
            },
            PendingState::Failed(error) => Poll::Ready(Err(error
                .take()
                .unwrap_or_else(|| Error::protocol("pending call polled after completion")))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
