//! Remote invocation in both directions.
//!
//! | Direction | Path |
//! |-----------|------|
//! | Outbound | [`RemoteReference::call_remote`] → [`CallCorrelator`] → `call` exchange |
//! | Inbound | `call` envelope → [`dispatcher::apply`] → [`ExportRegistry`] → `respond` exchange |
//! | Reply | `respond` envelope → [`dispatcher::apply`] → [`CallCorrelator::settle`] |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `correlator` | Pending outbound calls by correlation id |
//! | `dispatcher` | Effects of inbound envelopes |
//! | `exports` | Functions the peer may call |
//! | `handler` | Immediate or deferred handler results |
//! | `remote` | Proxies for peer objects |

// ============================================================================
// Submodules
// ============================================================================

/// Pending outbound calls.
pub mod correlator;

/// Inbound envelope dispatch.
pub mod dispatcher;

/// Exported function table.
pub mod exports;

/// Handler result type.
pub mod handler;

/// Remote object proxies.
pub mod remote;

// ============================================================================
// Re-exports
// ============================================================================

pub use correlator::{CallCorrelator, PendingCall};
pub use dispatcher::{DispatchContext, apply};
pub use exports::ExportRegistry;
pub use handler::{Handler, HandlerResult};
pub use remote::RemoteReference;
