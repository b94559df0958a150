//! Pool of outstanding exchanges.
//!
//! Tracks every in-flight [`Transport`] keyed by [`TransportId`]. The
//! connection consults it to keep at least one exchange outstanding while
//! connected, and drains it on disconnect.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            TransportPool                │
//! │  ┌─────────────────────────────────┐    │
//! │  │ TransportId=1 → noop  (listen)  │    │
//! │  │ TransportId=4 → respond         │    │
//! │  │ TransportId=5 → call            │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Some hosts keep exchanges running after the page unloads, so
//! [`TransportPool::abort_all`] cancels every tracked exchange explicitly.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::AbortHandle;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::identifiers::TransportId;
use crate::protocol::ActionKind;

// ============================================================================
// Transport
// ============================================================================

/// One in-flight exchange, owned by the pool until it completes or is aborted.
pub struct Transport {
    /// Unique id assigned at creation.
    id: TransportId,
    /// Action kind the exchange carries.
    purpose: ActionKind,
    /// Cancels the exchange at the host.
    abort: AbortHandle,
}

impl Transport {
    /// Creates a transport record for an exchange about to start.
    #[inline]
    #[must_use]
    pub fn new(id: TransportId, purpose: ActionKind, abort: AbortHandle) -> Self {
        Self { id, purpose, abort }
    }

    /// Returns the transport id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TransportId {
        self.id
    }

    /// Returns what the exchange carries.
    #[inline]
    #[must_use]
    pub fn purpose(&self) -> ActionKind {
        self.purpose
    }

    /// Cancels the exchange.
    #[inline]
    pub fn abort(&self) {
        self.abort.abort();
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("id", &self.id)
            .field("purpose", &self.purpose)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TransportPool
// ============================================================================

/// Outstanding exchanges by id.
#[derive(Debug, Default)]
pub struct TransportPool {
    /// Active transports.
    transports: Mutex<FxHashMap<TransportId, Transport>>,
    /// Last allocated transport id.
    counter: AtomicU64,
}

impl TransportPool {
    /// Creates an empty pool.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the id for the next transport.
    #[inline]
    #[must_use]
    pub fn next_id(&self) -> TransportId {
        TransportId::new(self.counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Starts tracking a transport.
    pub fn add(&self, transport: Transport) {
        let mut transports = self.transports.lock();
        trace!(
            transport_id = %transport.id,
            purpose = %transport.purpose,
            outstanding = transports.len() + 1,
            "Transport added"
        );
        transports.insert(transport.id, transport);
    }

    /// Starts tracking a transport only if nothing else is outstanding.
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// never both succeed. Returns `true` if the transport was added.
    pub fn add_if_empty(&self, transport: Transport) -> bool {
        let mut transports = self.transports.lock();
        if !transports.is_empty() {
            return false;
        }
        trace!(transport_id = %transport.id, purpose = %transport.purpose, "Listening transport added");
        transports.insert(transport.id, transport);
        true
    }

    /// Stops tracking a completed transport.
    pub fn remove(&self, id: TransportId) -> Option<Transport> {
        let mut transports = self.transports.lock();
        let removed = transports.remove(&id);
        if removed.is_some() {
            trace!(transport_id = %id, outstanding = transports.len(), "Transport removed");
        }
        removed
    }

    /// Returns the number of outstanding transports.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.transports.lock().len()
    }

    /// Returns `true` if nothing is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transports.lock().is_empty()
    }

    /// Returns `true` if the transport is still tracked.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: TransportId) -> bool {
        self.transports.lock().contains_key(&id)
    }

    /// Aborts every tracked exchange and clears the pool.
    ///
    /// Returns how many exchanges were aborted.
    pub fn abort_all(&self) -> usize {
        let drained: Vec<Transport> = {
            let mut transports = self.transports.lock();
            transports.drain().map(|(_, transport)| transport).collect()
        };

        for transport in &drained {
            transport.abort();
        }

        if !drained.is_empty() {
            debug!(count = drained.len(), "Aborted outstanding transports");
        }
        drained.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::future::{AbortRegistration, Abortable};

    fn transport(pool: &TransportPool, purpose: ActionKind) -> (Transport, AbortRegistration) {
        let (handle, registration) = AbortHandle::new_pair();
        (Transport::new(pool.next_id(), purpose, handle), registration)
    }

    #[test]
    fn test_next_id_monotonic() {
        let pool = TransportPool::new();
        let a = pool.next_id();
        let b = pool.next_id();
        assert_eq!(a.as_u64(), 1);
        assert!(b > a);
    }

    #[test]
    fn test_add_remove_count() {
        let pool = TransportPool::new();
        let (a, _ra) = transport(&pool, ActionKind::Noop);
        let (b, _rb) = transport(&pool, ActionKind::Call);
        let (a_id, b_id) = (a.id(), b.id());

        pool.add(a);
        pool.add(b);
        assert_eq!(pool.count(), 2);
        assert!(pool.contains(a_id));

        let removed = pool.remove(a_id).expect("tracked");
        assert_eq!(removed.purpose(), ActionKind::Noop);
        assert_eq!(pool.count(), 1);
        assert!(pool.remove(a_id).is_none());

        pool.remove(b_id);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_add_if_empty() {
        let pool = TransportPool::new();
        let (first, _r1) = transport(&pool, ActionKind::Noop);
        let (second, _r2) = transport(&pool, ActionKind::Noop);

        assert!(pool.add_if_empty(first));
        assert!(!pool.add_if_empty(second));
        assert_eq!(pool.count(), 1);
    }

    #[tokio::test]
    async fn test_abort_all_cancels_exchanges() {
        let pool = TransportPool::new();
        let (t, registration) = transport(&pool, ActionKind::Noop);
        pool.add(t);

        let exchange = Abortable::new(futures_util::future::pending::<()>(), registration);

        assert_eq!(pool.abort_all(), 1);
        assert!(pool.is_empty());
        assert!(exchange.await.is_err());
    }

    #[test]
    fn test_abort_all_empty() {
        let pool = TransportPool::new();
        assert_eq!(pool.abort_all(), 0);
    }
}
