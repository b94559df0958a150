//! Application of inbound envelopes.
//!
//! [`apply`] holds no state of its own; everything it touches comes through
//! a [`DispatchContext`]. One branch per action kind:
//!
//! | Action | Effect |
//! |--------|--------|
//! | `noop` | nothing |
//! | `call` | run the export, send exactly one `respond` |
//! | `respond` | settle the matching pending call, or drop the reply |
//! | `close` | force disconnection |

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures_util::FutureExt;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;
use crate::protocol::Envelope;

use super::correlator::CallCorrelator;
use super::exports::ExportRegistry;
use super::handler::HandlerResult;

// ============================================================================
// Constants
// ============================================================================

/// Disconnect reason used when the peer sends `close`.
pub const CLOSED_BY_PEER: &str = "Connection closed by remote host";

// ============================================================================
// DispatchContext
// ============================================================================

/// What the dispatcher needs from its surroundings.
///
/// Implemented by [`crate::transport::Connection`]. Cloning must be cheap;
/// a clone is moved into the task that waits on a deferred handler result.
pub trait DispatchContext: Clone + Send + Sync + 'static {
    /// Exported functions inbound calls resolve against.
    fn exports(&self) -> &ExportRegistry;

    /// Outstanding locally issued calls.
    fn correlator(&self) -> &CallCorrelator;

    /// Sends the reply to an inbound call.
    fn respond(&self, request_id: CorrelationId, outcome: Result<Value>);

    /// Forces the connection down.
    fn disconnect(&self, reason: &str);
}

// ============================================================================
// apply
// ============================================================================

/// Applies one inbound envelope.
///
/// Never panics because of a handler and never fails: every problem is
/// either turned into a failed reply or logged and dropped.
pub fn apply<C: DispatchContext>(envelope: Envelope, ctx: &C) {
    trace!(action = %envelope.kind(), "Applying envelope");

    match envelope {
        Envelope::Noop => {}

        Envelope::Call {
            function,
            request_id,
            args,
        } => dispatch_call(&function, request_id, args, ctx),

        Envelope::Respond {
            response_id,
            success,
            value,
        } => {
            if !ctx.correlator().settle(&response_id, success, value) {
                warn!(correlation_id = %response_id, "Reply for unknown or settled call dropped");
            }
        }

        Envelope::Close => ctx.disconnect(CLOSED_BY_PEER),
    }
}

/// Runs an inbound call and arranges its single reply.
fn dispatch_call<C: DispatchContext>(
    function: &str,
    request_id: CorrelationId,
    args: Vec<Value>,
    ctx: &C,
) {
    debug!(function, request_id = %request_id, argc = args.len(), "Inbound call");

    let handler = match ctx.exports().lookup(function) {
        Ok(handler) => handler,
        Err(e) => {
            warn!(function, error = %e, "Inbound call to unknown export");
            ctx.respond(request_id, Err(e));
            return;
        }
    };

    let result = catch_unwind(AssertUnwindSafe(|| handler(args))).unwrap_or_else(|panic| {
        warn!(function, "Export panicked");
        HandlerResult::error(panic_error(panic.as_ref()))
    });

    match result {
        HandlerResult::Ready(outcome) => ctx.respond(request_id, outcome),

        HandlerResult::Pending(future) => {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let outcome = AssertUnwindSafe(future)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(panic_error(panic.as_ref())));
                ctx.respond(request_id, outcome);
            });
        }
    }
}

/// Converts a caught panic payload into an error.
fn panic_error(panic: &(dyn Any + Send)) -> Error {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string());
    Error::remote(message)
}

// ============================================================================
// Tests
// ============================================================================
