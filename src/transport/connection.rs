//! Connection lifecycle over short-lived HTTP exchanges.
//!
//! The server cannot open a connection to the page, so the connection keeps
//! at least one exchange outstanding at all times. Whatever the server wants
//! to tell the page travels back in the response to that exchange.
//!
//! # Exchange Lifecycle
//!
//! 1. Register a [`Transport`] in the [`TransportPool`] (under the state lock)
//! 2. Spawn the host exchange wrapped in [`Abortable`]
//! 3. On completion: remove the transport, decode the body, dispatch it
//! 4. If nothing is outstanding any more, issue a `noop` to keep listening
//!
//! # Failure Handling
//!
//! Every failed exchange increments a counter that any successful exchange
//! resets. Reaching the threshold (3 by default) disconnects for good:
//! pending calls are rejected and outstanding exchanges aborted.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable, Aborted};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CorrelationId, ObjectId, SessionId, TransportId};
use crate::protocol::{ExchangeRequest, ExchangeResponse};
use crate::rpc::correlator::{CallCorrelator, PendingCall};
use crate::rpc::dispatcher::{self, DispatchContext};
use crate::rpc::exports::ExportRegistry;
use crate::session::SessionConfig;

use super::host::HttpHost;
use super::pool::{Transport, TransportPool};

// ============================================================================
// Constants
// ============================================================================

/// Disconnect reason once the failure threshold is reached.
pub const TOO_MANY_FAILURES: &str = "There are too many failures!";

/// Disconnect reason for a voluntary shutdown.
pub const PAGE_UNLOADED: &str = "page unloaded";

// ============================================================================
// ConnectionState
// ============================================================================

/// Connection state. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Exchanges may be issued.
    Connected,
    /// Gone for the rest of the session.
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Mutable link bookkeeping, guarded by one lock.
#[derive(Debug)]
struct LinkState {
    state: ConnectionState,
    consecutive_failures: u32,
    disconnect_reason: Option<String>,
}

// ============================================================================
// Connection
// ============================================================================

/// Shared connection internals.
struct ConnectionInner {
    /// Immutable session configuration.
    config: Arc<SessionConfig>,
    /// Performs exchanges.
    host: Arc<dyn HttpHost>,
    /// State and failure counter.
    link: Mutex<LinkState>,
    /// Outstanding exchanges.
    pool: TransportPool,
    /// Outstanding outbound calls.
    correlator: CallCorrelator,
    /// Functions the peer may call.
    exports: Arc<ExportRegistry>,
}

/// The page's end of the duplex channel.
///
/// Cheap to clone; clones share all state.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. Every state change happens under a lock
/// held only for the change itself, never across an await or a handler.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.inner.config.session_id)
            .field("state", &self.state())
            .field("outstanding", &self.inner.pool.count())
            .field("pending_calls", &self.inner.correlator.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Constructor
// ============================================================================

impl Connection {
    /// Creates a connected connection. No exchange is issued until
    /// [`Connection::open`] or the first call.
    #[must_use]
    pub fn new(
        config: Arc<SessionConfig>,
        host: Arc<dyn HttpHost>,
        exports: Arc<ExportRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                config,
                host,
                link: Mutex::new(LinkState {
                    state: ConnectionState::Connected,
                    consecutive_failures: 0,
                    disconnect_reason: None,
                }),
                pool: TransportPool::new(),
                correlator: CallCorrelator::new(),
                exports,
            }),
        }
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    /// Returns `true` while connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the number of consecutive failed exchanges.
    #[inline]
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.link.lock().consecutive_failures
    }

    /// Returns why the connection was dropped, once it has been.
    #[must_use]
    pub fn disconnect_reason(&self) -> Option<String> {
        self.inner.link.lock().disconnect_reason.clone()
    }

    /// Returns the number of outstanding exchanges.
    #[inline]
    #[must_use]
    pub fn outstanding_transports(&self) -> usize {
        self.inner.pool.count()
    }

    /// Returns the number of calls waiting for a reply.
    #[inline]
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.inner.correlator.len()
    }

    /// Returns the session id sent with every exchange.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.inner.config.session_id
    }

    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Returns the export table inbound calls resolve against.
    #[inline]
    #[must_use]
    pub fn export_registry(&self) -> &Arc<ExportRegistry> {
        &self.inner.exports
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Opens the listening channel.
    ///
    /// Issues a keepalive unless an exchange is already outstanding.
    pub fn open(&self) {
        if self.ensure_listening() {
            debug!(session_id = %self.inner.config.session_id, "Listening channel opened");
        }
    }

    /// Calls `method` on the peer object `target`.
    ///
    /// When disconnected, the returned call fails immediately with
    /// [`Error::ConnectionLost`] and nothing is sent. Outside a Tokio runtime
    /// it fails with [`Error::TransportFailure`]. Otherwise the call is
    /// registered and its exchange started before this returns.
    pub fn issue_call(&self, target: ObjectId, method: &str, args: Vec<Value>) -> PendingCall {
        if let Some(error) = self.lost_error() {
            debug!(method, "Call refused, not connected");
            return PendingCall::failed(error);
        }
        if Handle::try_current().is_err() {
            warn!(method, "Call refused, no async runtime");
            return PendingCall::failed(Error::transport_failure("no async runtime to run the exchange"));
        }

        let call = self.inner.correlator.reserve();
        let Some(id) = call.correlation_id().cloned() else {
            return PendingCall::failed(Error::protocol("reserved call has no id"));
        };

        let request = ExchangeRequest::call(
            &self.inner.config.base_url,
            &self.inner.config.session_id,
            &id,
            target,
            method,
            args,
        );

        debug!(correlation_id = %id, target = %target, method, "Issuing call");

        if !self.start_exchange(request, false) {
            // Disconnected after the check above, or no runtime; the call must not stay pending.
            self.inner.correlator.forget(&id);
            trace!(correlation_id = %id, "Call abandoned, exchange not started");
        }
        call
    }

    /// Best-effort `close` notification, then forced disconnection.
    ///
    /// Idempotent, and safe during teardown: without a runtime the
    /// notification is skipped.
    pub fn shutdown(&self) {
        if !self.is_connected() {
            return;
        }

        self.send_close();
        self.force_disconnect(PAGE_UNLOADED);
    }

    /// Moves to `Disconnected`, rejects every pending call and aborts every
    /// outstanding exchange.
    ///
    /// Returns `false` if already disconnected.
    pub fn force_disconnect(&self, reason: &str) -> bool {
        {
            let mut link = self.inner.link.lock();
            if link.state == ConnectionState::Disconnected {
                return false;
            }
            link.state = ConnectionState::Disconnected;
            link.disconnect_reason = Some(reason.to_string());
        }

        let rejected = self.inner.correlator.reject_all(reason);
        let aborted = self.inner.pool.abort_all();

        debug!(reason, rejected, aborted, "Connection closed");
        true
    }
}

// ============================================================================
// Connection - Exchanges
// ============================================================================

impl Connection {
    /// Registers and spawns one exchange.
    ///
    /// With `listen_only`, the exchange is started only if nothing else is
    /// outstanding. Returns `true` if the exchange was started; never starts
    /// one outside a Tokio runtime.
    fn start_exchange(&self, request: ExchangeRequest, listen_only: bool) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!(action = %request.action, "No async runtime, exchange not started");
            return false;
        };
        let (abort, registration) = AbortHandle::new_pair();
        let id = self.inner.pool.next_id();
        let transport = Transport::new(id, request.action, abort);
        let action = request.action;

        {
            // Holding the link lock orders this insert before any disconnect's abort_all.
            let link = self.inner.link.lock();
            if link.state != ConnectionState::Connected {
                return false;
            }
            if listen_only {
                if !self.inner.pool.add_if_empty(transport) {
                    return false;
                }
            } else {
                self.inner.pool.add(transport);
            }
        }

        trace!(transport_id = %id, action = %action, "Issuing exchange");

        let host = Arc::clone(&self.inner.host);
        let exchange = Abortable::new(async move { host.exchange(request).await }, registration);
        let connection = self.clone();
        runtime.spawn(async move {
            let outcome = exchange.await;
            connection.finish_exchange(id, outcome);
        });
        true
    }

    /// Handles a completed, failed or aborted exchange.
    fn finish_exchange(&self, id: TransportId, outcome: std::result::Result<Result<ExchangeResponse>, Aborted>) {
        self.inner.pool.remove(id);

        let Ok(response) = outcome else {
            trace!(transport_id = %id, "Exchange aborted");
            return;
        };

        if !self.is_connected() {
            trace!(transport_id = %id, "Exchange finished after disconnect, discarded");
            return;
        }

        match response.and_then(ExchangeResponse::into_envelope) {
            Ok(envelope) => {
                self.record_success();
                trace!(transport_id = %id, action = %envelope.kind(), "Received envelope");
                dispatcher::apply(envelope, self);
            }
            Err(e) => self.record_failure(id, &e),
        }

        self.ensure_listening();
    }

    /// Issues a keepalive if connected and nothing is outstanding.
    ///
    /// Returns `true` if one was issued.
    fn ensure_listening(&self) -> bool {
        if !self.is_connected() {
            return false;
        }

        let request =
            ExchangeRequest::noop(&self.inner.config.base_url, &self.inner.config.session_id);
        self.start_exchange(request, true)
    }

    /// Sends the reply to an inbound call.
    fn send_respond(&self, request_id: CorrelationId, outcome: Result<Value>) {
        let (success, value) = match outcome {
            Ok(value) => (true, value),
            Err(e) => (false, e.into_reply_value()),
        };

        let request = ExchangeRequest::respond(
            &self.inner.config.base_url,
            &self.inner.config.session_id,
            &request_id,
            success,
            value,
        );

        if !self.start_exchange(request, false) {
            debug!(request_id = %request_id, "Reply dropped, not connected");
        }
    }

    /// Fires the `close` notification without tracking it.
    ///
    /// Untracked, so the disconnect that follows does not abort it.
    fn send_close(&self) {
        let Ok(runtime) = Handle::try_current() else {
            debug!("No runtime during shutdown, close notification skipped");
            return;
        };

        let request =
            ExchangeRequest::close(&self.inner.config.base_url, &self.inner.config.session_id);

        let host = Arc::clone(&self.inner.host);
        runtime.spawn(async move {
            if let Err(e) = host.exchange(request).await {
                debug!(error = %e, "Close notification failed");
            }
        });
    }
}

// ============================================================================
// Connection - Failure Accounting
// ============================================================================

impl Connection {
    fn record_success(&self) {
        self.inner.link.lock().consecutive_failures = 0;
    }

    fn record_failure(&self, id: TransportId, e: &Error) {
        let failures = {
            let mut link = self.inner.link.lock();
            link.consecutive_failures += 1;
            link.consecutive_failures
        };

        warn!(transport_id = %id, failures, error = %e, "Exchange failed");

        if failures >= self.inner.config.failure_threshold {
            error!(failures, "Failure threshold reached, disconnecting");
            self.force_disconnect(TOO_MANY_FAILURES);
        }
    }

    /// Returns the error calls get once disconnected.
    fn lost_error(&self) -> Option<Error> {
        let link = self.inner.link.lock();
        match link.state {
            ConnectionState::Connected => None,
            ConnectionState::Disconnected => Some(Error::connection_lost(
                link.disconnect_reason.as_deref().unwrap_or("not connected"),
            )),
        }
    }
}

// ============================================================================
// DispatchContext
// ============================================================================

impl DispatchContext for Connection {
    fn exports(&self) -> &ExportRegistry {
        &self.inner.exports
    }

    fn correlator(&self) -> &CallCorrelator {
        &self.inner.correlator
    }

    fn respond(&self, request_id: CorrelationId, outcome: Result<Value>) {
        self.send_respond(request_id, outcome);
    }

    fn disconnect(&self, reason: &str) {
        self.force_disconnect(reason);
    }
}

// ============================================================================
// Tests
// ============================================================================
