//! Return values of exported functions.
//!
//! A handler either has its answer right away or hands back a future that
//! will produce it. The dispatcher branches on this tag and never inspects
//! the value itself.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// An exported function.
///
/// Receives the call's positional arguments.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> HandlerResult + Send + Sync>;

// ============================================================================
// HandlerResult
// ============================================================================

/// Outcome of invoking a handler.
pub enum HandlerResult {
    /// The answer is available now.
    Ready(Result<Value>),

    /// The answer arrives when the future settles.
    Pending(BoxFuture<'static, Result<Value>>),
}

impl HandlerResult {
    /// Immediate success.
    #[inline]
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Ready(Ok(value.into()))
    }

    /// Immediate success with no meaningful value.
    #[inline]
    #[must_use]
    pub fn unit() -> Self {
        Self::Ready(Ok(Value::Null))
    }

    /// Immediate failure.
    #[inline]
    #[must_use]
    pub fn error(error: Error) -> Self {
        Self::Ready(Err(error))
    }

    /// Deferred answer.
    #[must_use]
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    /// Returns `true` if the answer is deferred.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Waits for the answer, whichever form it takes.
    pub async fn settle(self) -> Result<Value> {
        match self {
            Self::Ready(outcome) => outcome,
            Self::Pending(future) => future.await,
        }
    }
}

impl From<Result<Value>> for HandlerResult {
    fn from(outcome: Result<Value>) -> Self {
        Self::Ready(outcome)
    }
}

impl fmt::Debug for HandlerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(outcome) => f.debug_tuple("Ready").field(outcome).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
