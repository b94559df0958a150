//! Error types for livepage.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use livepage::{Result, Error};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     let total = session.server().call_remote("add", vec![1.into(), 2.into()]).await?;
//!     println!("{total}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | Exchange | [`Error::TransportFailure`] | Counted; connection survives below threshold |
//! | Connection | [`Error::ConnectionLost`] | Terminal for the session |
//! | Remote | [`Error::RemoteInvocation`] | Per call |
//! | Protocol | [`Error::Protocol`] | Per message |
//! | Configuration | [`Error::Config`] | Fix the builder |
//! | External | [`Error::Json`], [`Error::Url`] | Per operation |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Exchange Errors
    // ========================================================================
    /// A single HTTP exchange failed.
    ///
    /// Covers network errors, non-2xx statuses and response bodies that do
    /// not decode to an envelope.
    #[error("Transport failure: {message}")]
    TransportFailure {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The connection is gone for good.
    ///
    /// Delivered to every pending call at disconnect time and to every call
    /// attempted afterwards.
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// Why the connection was dropped.
        reason: String,
    },

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// A remote invocation reported failure.
    ///
    /// Carries the error value exactly as the failing side reported it.
    #[error("Remote invocation failed: {}", describe_value(.value))]
    RemoteInvocation {
        /// Error value reported by the invoked side.
        value: Value,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unresolved name.
    ///
    /// Fatal to the message or operation being processed, never to the
    /// connection by itself.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a transport failure error.
    #[inline]
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
        }
    }

    /// Creates a connection lost error.
    #[inline]
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    /// Creates a remote invocation error from the reported value.
    #[inline]
    pub fn remote(value: impl Into<Value>) -> Self {
        Self::RemoteInvocation {
            value: value.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the connection is permanently gone.
    #[inline]
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost { .. })
    }

    /// Returns `true` if this is a single failed exchange.
    #[inline]
    #[must_use]
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }

    /// Returns `true` if this is a protocol error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::Json(_))
    }

    /// Returns `true` if the invoked side reported the failure.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteInvocation { .. })
    }

    /// Converts this error into the value sent back in a failed reply.
    ///
    /// Remote errors keep their original value; everything else becomes its
    /// display string.
    #[must_use]
    pub fn into_reply_value(self) -> Value {
        match self {
            Self::RemoteInvocation { value } => value,
            other => Value::String(other.to_string()),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Renders a reported error value for display.
fn describe_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
