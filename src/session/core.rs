//! Page session: connection, exports and widgets bundled together.
//!
//! One [`Session`] per page. Dropping it runs the unload finalizer, so
//! several independent sessions can live in one process.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::dom::Document;
use crate::error::{Error, Result};
use crate::identifiers::ObjectId;
use crate::rpc::{ExportRegistry, Handler, RemoteReference};
use crate::transport::{Connection, HttpHost};
use crate::widget::{WidgetFactory, WidgetRegistry, widget_call_handler};

use super::builder::SessionBuilder;
use super::config::SessionConfig;

// ============================================================================
// Session
// ============================================================================

/// One live page.
///
/// # Lifecycle
///
/// 1. [`Session::builder`] - configure and build
/// 2. [`Session::start`] - first keepalive, widget sweep
/// 3. [`Session::shutdown`] (or drop) - close notification, disconnect
pub struct Session {
    /// Shared settings.
    config: Arc<SessionConfig>,
    /// Duplex channel to the server.
    connection: Connection,
    /// Live widgets.
    widgets: Arc<WidgetRegistry>,
    /// Rendered page.
    document: Arc<dyn Document>,
    /// Set by the first `start`.
    started: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.config.session_id)
            .field("connection", &self.connection)
            .field("widgets", &self.widgets.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Constructor
// ============================================================================

impl Session {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn new(
        config: SessionConfig,
        host: Arc<dyn HttpHost>,
        document: Arc<dyn Document>,
        exports: Vec<(String, Handler)>,
        widget_types: Vec<(String, WidgetFactory)>,
    ) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(ExportRegistry::new());
        let connection = Connection::new(Arc::clone(&config), host, Arc::clone(&registry));
        let widgets = Arc::new(WidgetRegistry::new(
            connection.clone(),
            Arc::clone(&document),
        ));

        registry.register_handler(
            config.widget_call_export.clone(),
            widget_call_handler(&widgets),
        );
        for (name, handler) in exports {
            registry.register_handler(name, handler);
        }
        for (type_name, factory) in widget_types {
            widgets.register_factory(type_name, factory);
        }

        debug!(
            session_id = %config.session_id,
            base_url = %config.base_url,
            exports = registry.len(),
            "Session created"
        );

        Self {
            config,
            connection,
            widgets,
            document,
            started: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the widget registry.
    #[inline]
    #[must_use]
    pub fn widgets(&self) -> &Arc<WidgetRegistry> {
        &self.widgets
    }

    /// Returns the document.
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }

    /// Returns the reference to the server's root object (id 0).
    #[inline]
    #[must_use]
    pub fn server(&self) -> RemoteReference {
        RemoteReference::new(ObjectId::ROOT, self.connection.clone())
    }
}

// ============================================================================
// Session - Public API
// ============================================================================

impl Session {
    /// Goes live: waits the startup delay, opens the listening channel and
    /// sweeps the document for widgets.
    ///
    /// Returns how many widgets were loaded. Once a start has gone live,
    /// calling it again does nothing. A start dropped during the delay can
    /// be retried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionLost`] if the session was shut down first.
    pub async fn start(&self) -> Result<usize> {
        if !self.config.startup_delay.is_zero() {
            tokio::time::sleep(self.config.startup_delay).await;
        }

        if let Some(reason) = self.connection.disconnect_reason() {
            return Err(Error::connection_lost(reason));
        }

        // No await past this point, so a claimed start always goes live.
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Session already started");
            return Ok(0);
        }

        self.connection.open();
        let loaded = self.widgets.sweep();

        info!(session_id = %self.config.session_id, widgets = loaded, "Session started");
        Ok(loaded)
    }

    /// Unload finalizer: best-effort close notification, then disconnect.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.connection.is_connected() {
            info!(session_id = %self.config.session_id, "Session shutting down");
        }
        self.connection.shutdown();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::dom::{ATTR_OBJECT_ID, ATTR_TYPE_NAME, MemoryDocument};
    use crate::protocol::{ActionKind, ExchangeRequest, ExchangeResponse};
    use crate::transport::ConnectionState;
    use crate::widget::{DefaultWidget, Widget};

    /// Answers every exchange after a long pause and records its action.
    #[derive(Clone, Default)]
    struct SlowHost {
        actions: Arc<Mutex<Vec<ActionKind>>>,
    }

    #[async_trait]
    impl HttpHost for SlowHost {
        async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeResponse> {
            self.actions.lock().push(request.action);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(ExchangeResponse::new(200, ""))
        }
    }

    fn page() -> Arc<MemoryDocument> {
        let doc = Arc::new(MemoryDocument::new());
        doc.append(doc.root(), "div", &[(ATTR_OBJECT_ID, "1"), (ATTR_TYPE_NAME, "Plain")]);
        doc.append(doc.root(), "div", &[(ATTR_OBJECT_ID, "2"), (ATTR_TYPE_NAME, "Plain")]);
        doc
    }

    fn session(host: SlowHost) -> Session {
        Session::builder()
            .location("http://localhost/page")
            .host(host)
            .document(page())
            .startup_delay(Duration::ZERO)
            .widget_type("Plain", |base| Arc::new(DefaultWidget::new(base)) as Arc<dyn Widget>)
            .build()
            .expect("session")
    }

    #[tokio::test]
    async fn test_start_opens_channel_and_sweeps() {
        let host = SlowHost::default();
        let session = session(host.clone());

        assert_eq!(session.start().await.expect("start"), 2);
        assert_eq!(session.start().await.expect("start"), 0);

        tokio::task::yield_now().await;
        assert_eq!(host.actions.lock().as_slice(), [ActionKind::Noop]);
        assert_eq!(session.connection().outstanding_transports(), 1);
        assert_eq!(session.widgets().len(), 2);
    }

    #[tokio::test]
    async fn test_start_after_shutdown_fails() {
        let session = session(SlowHost::default());
        session.shutdown();

        let err = session.start().await.unwrap_err();
        assert!(err.is_connection_lost());
    }

    #[tokio::test]
    async fn test_server_is_root_reference() {
        let session = session(SlowHost::default());
        assert!(session.server().object_id().is_root());
    }

    #[tokio::test]
    async fn test_shutdown_aborts_outstanding() {
        let host = SlowHost::default();
        let session = session(host.clone());
        session.start().await.expect("start");
        tokio::task::yield_now().await;

        session.shutdown();
        assert_eq!(session.connection().state(), ConnectionState::Disconnected);
        assert_eq!(session.connection().outstanding_transports(), 0);

        tokio::task::yield_now().await;
        assert_eq!(
            host.actions.lock().as_slice(),
            [ActionKind::Noop, ActionKind::Close]
        );
    }

    #[test]
    fn test_drop_without_runtime_is_safe() {
        let session = session(SlowHost::default());
        drop(session);
    }

    #[test]
    fn test_call_without_runtime_fails() {
        use futures_util::FutureExt;

        let host = SlowHost::default();
        let session = session(host.clone());

        let outcome = session
            .server()
            .call_remote("ping", vec![])
            .now_or_never()
            .expect("resolved without a runtime");

        assert!(outcome.unwrap_err().is_transport_failure());
        assert!(host.actions.lock().is_empty());
        assert_eq!(session.connection().pending_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_start_can_be_retried() {
        let host = SlowHost::default();
        let session = Session::builder()
            .location("http://localhost/page")
            .host(host.clone())
            .document(page())
            .startup_delay(Duration::from_millis(200))
            .widget_type("Plain", |base| Arc::new(DefaultWidget::new(base)) as Arc<dyn Widget>)
            .build()
            .expect("session");

        let first = tokio::time::timeout(Duration::from_millis(10), session.start()).await;
        assert!(first.is_err());
        assert_eq!(session.connection().outstanding_transports(), 0);

        let loaded = session.start().await.expect("start");
        assert_eq!(loaded, 2);
        assert_eq!(session.connection().outstanding_transports(), 1);

        assert_eq!(session.start().await.expect("restart"), 0);
        assert_eq!(session.connection().outstanding_transports(), 1);
        session.shutdown();
    }
}
