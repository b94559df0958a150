//! Page session lifecycle.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Connection, exports and widgets of one page |
//! | [`SessionBuilder`] | Fluent configuration builder |
//! | [`SessionConfig`] | Validated immutable settings |
//!
//! # Example
//!
//! ```ignore
//! use livepage::{HandlerResult, Session};
//!
//! let session = Session::builder()
//!     .location("https://example.com/live/page")
//!     .host(ReqwestHost::new())
//!     .export("Page.alert", |args| HandlerResult::value(args.len()))
//!     .build()?;
//!
//! session.start().await?;
//! let answer = session.server().call_remote("getAnswer", vec![]).await?;
//! session.shutdown();
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for sessions.
pub mod builder;

/// Validated session configuration.
pub mod config;

/// Session implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use config::{
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_STARTUP_DELAY, DEFAULT_WIDGET_CALL_EXPORT, SessionConfig,
};
pub use core::Session;
