//! Validated session configuration.
//!
//! Fixed when the session is built and never renegotiated.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `session_id` | random UUID v4 |
//! | `failure_threshold` | 3 |
//! | `startup_delay` | 1 ms |
//! | `widget_call_export` | `Nevow.Athena.callByAthenaID` |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::base_url_from_location;

// ============================================================================
// Constants
// ============================================================================

/// Consecutive failed exchanges before the connection gives up.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Delay before the first keepalive and the widget sweep.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_millis(1);

/// Export name compatible servers use to call widget methods.
pub const DEFAULT_WIDGET_CALL_EXPORT: &str = "Nevow.Athena.callByAthenaID";

// ============================================================================
// SessionConfig
// ============================================================================

/// Immutable per-session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Transport endpoint every exchange is posted to.
    pub base_url: Url,

    /// Sent with every exchange.
    pub session_id: SessionId,

    /// Consecutive failures that force a disconnect.
    pub failure_threshold: u32,

    /// Wait before going live.
    pub startup_delay: Duration,

    /// Name of the export that routes peer calls to widgets.
    pub widget_call_export: String,
}

impl SessionConfig {
    /// Creates a configuration for the page at `location` with defaults
    /// everywhere else.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `location` is not an absolute URL.
    pub fn for_location(location: &str) -> Result<Self> {
        let base_url = base_url_from_location(location)
            .map_err(|e| Error::config(format!("invalid page location {location:?}: {e}")))?;

        Ok(Self {
            base_url,
            session_id: SessionId::generate(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            startup_delay: DEFAULT_STARTUP_DELAY,
            widget_call_export: DEFAULT_WIDGET_CALL_EXPORT.to_string(),
        })
    }

    /// Checks the invariants the connection relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::config("failure threshold must be at least 1"));
        }
        if self.session_id.as_str().is_empty() {
            return Err(Error::config("session id must not be empty"));
        }
        if self.widget_call_export.is_empty() {
            return Err(Error::config("widget call export name must not be empty"));
        }
        if self.base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "base url {} cannot carry a path",
                self.base_url
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
