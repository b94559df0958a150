//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Wire form | Scope |
//! |------|-----------|-------|
//! | [`ObjectId`] | integer | Addressable object, assigned by the server at render time |
//! | [`CorrelationId`] | `c2s<n>` | Locally issued call, unique for the session |
//! | [`TransportId`] | not on the wire | One in-flight HTTP exchange |
//! | [`SessionId`] | opaque string | Page session, sent in every request |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ObjectId
// ============================================================================

/// Identity of an addressable object on either end.
///
/// `0` is reserved for the peer's root endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// The peer's root-addressable endpoint.
    pub const ROOT: Self = Self(0);

    /// Creates an object ID from its integer form.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the integer form.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns `true` for the root endpoint.
    #[inline]
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0 == 0
    }

    /// Parses the attribute form rendered into markup.
    ///
    /// Leading and trailing whitespace is ignored; anything that is not a
    /// non-negative integer yields `None`.
    #[must_use]
    pub fn parse(attr: &str) -> Option<Self> {
        attr.trim().parse().ok().map(Self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// CorrelationId
// ============================================================================

/// Token linking a call to its eventual reply.
///
/// Locally issued ids have the form `c2s<n>`; ids received from the peer are
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Scheme prefix for calls issued by this end.
    pub const LOCAL_PREFIX: &'static str = "c2s";

    /// Builds the id of the `seq`-th locally issued call.
    #[inline]
    #[must_use]
    pub fn local(seq: u64) -> Self {
        Self(format!("{}{seq}", Self::LOCAL_PREFIX))
    }

    /// Wraps an id chosen by the peer.
    #[inline]
    #[must_use]
    pub fn from_peer(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the wire form.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// TransportId
// ============================================================================

/// Identity of one in-flight exchange.
///
/// Allocated by the owning [`crate::transport::TransportPool`], never reused
/// within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(u64);

impl TransportId {
    /// Creates a transport ID from its integer form.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the integer form.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// Opaque page-session identifier supplied at page load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a session identifier handed out by the server.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random session identifier.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the wire form.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
