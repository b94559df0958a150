//! Builder for page sessions.
//!
//! # Example
//!
//! ```ignore
//! use livepage::{HandlerResult, Session};
//!
//! let session = Session::builder()
//!     .location("https://example.com/live/page?tab=2")
//!     .host(ReqwestHost::new())
//!     .export("Page.ping", |_| HandlerResult::value("pong"))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::dom::{Document, MemoryDocument};
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::rpc::{Handler, HandlerResult};
use crate::transport::HttpHost;
use crate::widget::{Widget, WidgetBase, WidgetFactory};

use super::config::SessionConfig;
use super::core::Session;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Fluent configuration for a [`Session`].
///
/// Use [`Session::builder()`] to create one.
#[derive(Default)]
pub struct SessionBuilder {
    /// Page location the transport URL derives from.
    location: Option<String>,
    /// Session id handed out by the server.
    session_id: Option<SessionId>,
    /// Performs exchanges.
    host: Option<Arc<dyn HttpHost>>,
    /// Rendered page.
    document: Option<Arc<dyn Document>>,
    /// Exported functions.
    exports: Vec<(String, Handler)>,
    /// Widget type factories.
    widget_types: Vec<(String, WidgetFactory)>,
    /// Failure threshold override.
    failure_threshold: Option<u32>,
    /// Startup delay override.
    startup_delay: Option<Duration>,
    /// Widget call export name override.
    widget_call_export: Option<String>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("location", &self.location)
            .field("session_id", &self.session_id)
            .field("has_host", &self.host.is_some())
            .field("has_document", &self.document.is_some())
            .field("exports", &self.exports.len())
            .field("widget_types", &self.widget_types.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page location, e.g. `https://example.com/live/page`.
    #[inline]
    #[must_use]
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the session id. A random one is generated otherwise.
    #[inline]
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(SessionId::new(id));
        self
    }

    /// Sets the exchange host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl HttpHost) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    /// Sets an already shared exchange host.
    #[inline]
    #[must_use]
    pub fn shared_host(mut self, host: Arc<dyn HttpHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the document. An empty [`MemoryDocument`] is used otherwise.
    #[inline]
    #[must_use]
    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    /// Exports a function the peer may call by `name`.
    #[must_use]
    pub fn export<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<serde_json::Value>) -> HandlerResult + Send + Sync + 'static,
    {
        self.exports.push((name.into(), Arc::new(handler)));
        self
    }

    /// Registers the factory for nodes naming `type_name`.
    #[must_use]
    pub fn widget_type<F>(mut self, type_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(WidgetBase) -> Arc<dyn Widget> + Send + Sync + 'static,
    {
        self.widget_types.push((type_name.into(), Arc::new(factory)));
        self
    }

    /// Sets how many consecutive failures force a disconnect.
    #[inline]
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Sets the wait before [`Session::start`] goes live.
    #[inline]
    #[must_use]
    pub fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = Some(delay);
        self
    }

    /// Renames the export that routes peer calls to widgets.
    #[inline]
    #[must_use]
    pub fn widget_call_export(mut self, name: impl Into<String>) -> Self {
        self.widget_call_export = Some(name.into());
        self
    }

    /// Builds the session with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the location or host is missing
    /// - [`Error::Config`] if the location is not an absolute URL
    /// - [`Error::Config`] if the failure threshold is zero
    pub fn build(self) -> Result<Session> {
        let config = self.resolve_config()?;
        let host = self.host.ok_or_else(|| {
            Error::config(
                "An HTTP host is required. Use .host() to set it.\n\
                 Example: Session::builder().host(ReqwestHost::new())",
            )
        })?;
        let document = self
            .document
            .unwrap_or_else(|| Arc::new(MemoryDocument::new()));

        Ok(Session::new(
            config,
            host,
            document,
            self.exports,
            self.widget_types,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    fn resolve_config(&self) -> Result<SessionConfig> {
        let location = self.location.as_deref().ok_or_else(|| {
            Error::config(
                "A page location is required. Use .location() to set it.\n\
                 Example: Session::builder().location(\"https://example.com/live\")",
            )
        })?;

        let mut config = SessionConfig::for_location(location)?;
        if let Some(id) = &self.session_id {
            config.session_id = id.clone();
        }
        if let Some(threshold) = self.failure_threshold {
            config.failure_threshold = threshold;
        }
        if let Some(delay) = self.startup_delay {
            config.startup_delay = delay;
        }
        if let Some(name) = &self.widget_call_export {
            config.widget_call_export = name.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
