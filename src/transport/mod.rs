//! HTTP transport layer.
//!
//! This module turns request/response HTTP into a duplex channel between
//! the page (local end) and the server (remote end).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Page (Rust)    │   POST ?action=noop|call|... │  Server         │
//! │                 │─────────────────────────────►│                 │
//! │  Connection     │                              │  Live page      │
//! │  → Pool         │◄─────────────────────────────│  resource       │
//! │  → HttpHost     │   [action, args] envelope    │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::new` - Connected, nothing outstanding
//! 2. `Connection::open` - First keepalive, server can now push
//! 3. `Connection::issue_call` - Outbound calls, replies correlated by id
//! 4. `Connection::shutdown` - Close notification, forced disconnect
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | State, keepalive, failure counting |
//! | `host` | Host adapter seam for HTTP exchanges |
//! | `pool` | Outstanding exchange tracking |

// ============================================================================
// Submodules
// ============================================================================

/// Connection state and exchange orchestration.
pub mod connection;

/// Host adapter for HTTP exchanges.
pub mod host;

/// Outstanding exchange tracking.
pub mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionState};
#[cfg(feature = "reqwest")]
pub use host::ReqwestHost;
pub use host::HttpHost;
pub use pool::{Transport, TransportPool};
