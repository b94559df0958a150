//! Live objects bound to rendered nodes.
//!
//! The server renders a node carrying an object id (and optionally a widget
//! type name). The first time anything refers to that id, the
//! [`WidgetRegistry`] builds the matching [`Widget`] and keeps it for the
//! rest of the session.
//!
//! Shared behavior lives in [`WidgetBase`]; concrete widgets hold one and
//! hand it out through [`Widget::base`].
//!
//! # Example
//!
//! ```ignore
//! struct Counter {
//!     base: WidgetBase,
//! }
//!
//! impl Widget for Counter {
//!     fn base(&self) -> &WidgetBase {
//!         &self.base
//!     }
//!
//!     fn invoke(&self, method: &str, args: Vec<Value>) -> HandlerResult {
//!         match method {
//!             "show" => self.base.replace_content(&args[0].to_string()).map(|()| Value::Null).into(),
//!             _ => HandlerResult::error(Error::protocol("unknown method")),
//!         }
//!     }
//! }
//!
//! session.widgets().register_type("Counter", |base| Arc::new(Counter { base }));
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `registry` | Singleton table, type factories, page sweep |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dom::{self, Document, NodeId};
use crate::error::{Error, Result};
use crate::identifiers::ObjectId;
use crate::rpc::{HandlerResult, PendingCall, RemoteReference};

// ============================================================================
// Submodules
// ============================================================================

/// Live object table.
pub mod registry;

pub use registry::{WidgetFactory, WidgetRegistry, widget_call_handler};

// ============================================================================
// Widget
// ============================================================================

/// A live object.
pub trait Widget: Send + Sync + 'static {
    /// Returns the shared widget state.
    fn base(&self) -> &WidgetBase;

    /// Runs once after the page sweep has constructed this widget.
    fn loaded(&self) {}

    /// Handles a call the peer routed to this widget.
    ///
    /// The default knows no methods.
    fn invoke(&self, method: &str, args: Vec<Value>) -> HandlerResult {
        let _ = args;
        HandlerResult::error(Error::protocol(format!(
            "widget {} has no method {method:?}",
            self.base().object_id()
        )))
    }
}

// ============================================================================
// WidgetBase
// ============================================================================

/// State and helpers every widget shares.
#[derive(Clone)]
pub struct WidgetBase {
    /// Node carrying the object id.
    node: NodeId,
    /// Widget type named on the node.
    type_name: Option<String>,
    /// Peer-side counterpart, same object id.
    remote: RemoteReference,
    /// Page the node lives in.
    document: Arc<dyn Document>,
}

impl fmt::Debug for WidgetBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetBase")
            .field("object_id", &self.object_id())
            .field("node", &self.node)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

impl WidgetBase {
    pub(crate) fn new(
        node: NodeId,
        type_name: Option<String>,
        remote: RemoteReference,
        document: Arc<dyn Document>,
    ) -> Self {
        Self {
            node,
            type_name,
            remote,
            document,
        }
    }

    /// Returns the object id.
    #[inline]
    #[must_use]
    pub fn object_id(&self) -> ObjectId {
        self.remote.object_id()
    }

    /// Returns the node carrying the object id.
    #[inline]
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the widget type named on the node, if any.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Returns the reference to the peer-side counterpart.
    #[inline]
    #[must_use]
    pub fn remote(&self) -> &RemoteReference {
        &self.remote
    }

    /// Returns the document.
    #[inline]
    #[must_use]
    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }

    /// Calls `method` on the peer-side counterpart.
    pub fn call_remote(&self, method: &str, args: Vec<Value>) -> PendingCall {
        self.remote.call_remote(method, args)
    }

    /// Finds the single node below this widget with `name` set to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if there is no such node or more than one.
    pub fn node_by_attribute(&self, name: &str, value: &str) -> Result<NodeId> {
        dom::node_by_attribute(self.document.as_ref(), self.node, name, value)
    }

    /// Finds every node below this widget with `name` set to `value`.
    #[must_use]
    pub fn nodes_by_attribute(&self, name: &str, value: &str) -> Vec<NodeId> {
        dom::nodes_by_attribute(self.document.as_ref(), self.node, name, value)
    }

    /// Replaces the widget's content with `markup`.
    ///
    /// # Errors
    ///
    /// Returns whatever the document reports.
    pub fn replace_content(&self, markup: &str) -> Result<()> {
        self.document.replace_content(self.node, markup)
    }
}

// ============================================================================
// DefaultWidget
// ============================================================================

/// Widget built for nodes that name no type.
#[derive(Debug)]
pub struct DefaultWidget {
    base: WidgetBase,
}

impl DefaultWidget {
    /// Wraps `base`.
    #[inline]
    #[must_use]
    pub fn new(base: WidgetBase) -> Self {
        Self { base }
    }
}

impl Widget for DefaultWidget {
    fn base(&self) -> &WidgetBase {
        &self.base
    }
}
