//! Table of functions the peer may call.
//!
//! Populated by application code when the session is built; inbound `call`
//! envelopes resolve their function name here. There is no dynamic lookup
//! beyond this table.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

use super::handler::{Handler, HandlerResult};

// ============================================================================
// ExportRegistry
// ============================================================================

/// Name → handler table for inbound calls.
#[derive(Default)]
pub struct ExportRegistry {
    /// Registered handlers.
    handlers: RwLock<FxHashMap<String, Handler>>,
}

impl fmt::Debug for ExportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut names: Vec<&String> = handlers.keys().collect();
        names.sort();
        f.debug_struct("ExportRegistry")
            .field("names", &names)
            .finish()
    }
}

impl ExportRegistry {
    /// Creates an empty table.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `name`, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_handler(name, Arc::new(handler));
    }

    /// Registers an already shared handler.
    pub fn register_handler(&self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        debug!(export = %name, "Export registered");
        self.handlers.write().insert(name, handler);
    }

    /// Looks up a handler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if nothing is registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<Handler> {
        self.handlers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::protocol(format!("no exported function named {name:?}")))
    }

    /// Returns `true` if `name` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
