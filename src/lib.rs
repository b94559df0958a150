//! Livepage - duplex object invocation over request/response HTTP.
//!
//! A page and its server call methods on each other's objects even though
//! the server can never open a connection to the page. The page keeps a
//! request outstanding at all times and the server answers it whenever it
//! has something to say.
//!
//! # Architecture
//!
//! - **Local End (Rust)**: Issues exchanges, correlates replies, hosts widgets
//! - **Remote End (Server)**: Answers exchanges, pushes calls in responses
//!
//! Key design principles:
//!
//! - One [`Session`] per page owns every table; nothing is global
//! - Every envelope is `[actionName, actionArgs]` (`noop`, `call`, `respond`, `close`)
//! - Replies are matched by correlation id, never by arrival order
//! - Three consecutive failed exchanges disconnect for good
//!
//! # Quick Start
//!
//! ```ignore
//! use livepage::{HandlerResult, ReqwestHost, Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::builder()
//!         .location("https://example.com/live/page")
//!         .host(ReqwestHost::new())
//!         .export("Page.notify", |args| {
//!             println!("server says {args:?}");
//!             HandlerResult::unit()
//!         })
//!         .build()?;
//!
//!     session.start().await?;
//!
//!     let greeting = session.server().call_remote("greet", vec!["world".into()]).await?;
//!     println!("{greeting}");
//!
//!     session.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`dom`] | Document seam: [`Document`], [`MemoryDocument`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire envelope and HTTP framing |
//! | [`rpc`] | Correlation, dispatch, exports, remote references |
//! | [`session`] | [`Session`] lifecycle and configuration |
//! | [`transport`] | Connection state, keepalive, exchange pool |
//! | [`util`] | Debouncing |
//! | [`widget`] | Live objects bound to rendered nodes |
//!
//! # Features
//!
//! - `reqwest`: [`ReqwestHost`], an [`HttpHost`] over `reqwest::Client`

// ============================================================================
// Modules
// ============================================================================

/// Document seam for live objects.
pub mod dom;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing object, correlation and transport ids.
pub mod identifiers;

/// Wire envelope and HTTP framing.
pub mod protocol;

/// Remote invocation: correlation, dispatch, exports, references.
pub mod rpc;

/// Page session lifecycle.
///
/// Use [`Session::builder()`] to create a configured session.
pub mod session;

/// HTTP transport layer.
///
/// Keeps the listening channel open and counts failures.
pub mod transport;

/// Helpers for code built on top of sessions.
pub mod util;

/// Live objects bound to rendered nodes.
pub mod widget;

// ============================================================================
// Re-exports
// ============================================================================

// Document types
pub use dom::{Document, MemoryDocument, NodeId};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CorrelationId, ObjectId, SessionId, TransportId};

// Protocol types
pub use protocol::{ActionKind, Envelope};

// RPC types
pub use rpc::{ExportRegistry, Handler, HandlerResult, PendingCall, RemoteReference};

// Session types
pub use session::{Session, SessionBuilder, SessionConfig};

// Transport types
#[cfg(feature = "reqwest")]
pub use transport::ReqwestHost;
pub use transport::{Connection, ConnectionState, HttpHost};

// Utility types
pub use util::Debouncer;

// Widget types
pub use widget::{DefaultWidget, Widget, WidgetBase, WidgetFactory, WidgetRegistry};
