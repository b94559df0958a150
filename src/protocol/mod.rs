//! Wire protocol types.
//!
//! This module defines the message format exchanged between the page
//! (local end) and the server (remote end).
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `noop` | either | Keep a listening exchange open |
//! | `call` | either | Invoke an exported function |
//! | `respond` | either | Reply to a call, success or failure |
//! | `close` | either | End the session |
//!
//! Requests travel as HTTP `POST` bodies; the peer's envelopes travel back
//! in HTTP response bodies.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Envelope type and codec |
//! | `request` | HTTP framing: URLs, headers, bodies |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope type and codec.
pub mod envelope;

/// HTTP request/response framing.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{ActionKind, Envelope, decode, encode};
pub use request::{
    CONTENT_TYPE, ExchangeRequest, ExchangeResponse, REQUEST_ID_HEADER, RESPONSE_ID_HEADER,
    SESSION_HEADER, base_url_from_location,
};
