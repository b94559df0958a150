//! Proxies for objects living on the peer.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use crate::identifiers::ObjectId;
use crate::transport::Connection;

use super::correlator::PendingCall;

// ============================================================================
// RemoteReference
// ============================================================================

/// Addresses one peer object by id.
///
/// Cheap to clone. References with the same id are interchangeable.
#[derive(Clone)]
pub struct RemoteReference {
    /// Target object on the peer.
    object_id: ObjectId,
    /// Connection calls travel over.
    connection: Connection,
}

impl fmt::Debug for RemoteReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteReference")
            .field("object_id", &self.object_id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RemoteReference {
    fn eq(&self, other: &Self) -> bool {
        self.object_id == other.object_id
    }
}

impl Eq for RemoteReference {}

impl RemoteReference {
    /// Creates a reference to `object_id` over `connection`.
    #[inline]
    #[must_use]
    pub fn new(object_id: ObjectId, connection: Connection) -> Self {
        Self {
            object_id,
            connection,
        }
    }

    /// Returns the peer object's id.
    #[inline]
    #[must_use]
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Returns the connection this reference calls through.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Invokes `method` on the peer object.
    ///
    /// The call is sent before this returns; await the result to observe it.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let rows = session.server().call_remote("getRows", vec![json!(0), json!(50)]).await?;
    /// ```
    pub fn call_remote(&self, method: &str, args: Vec<Value>) -> PendingCall {
        self.connection.issue_call(self.object_id, method, args)
    }
}
