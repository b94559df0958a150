//! Host adapter seam for HTTP exchanges.
//!
//! The core never touches a network stack directly. It hands every
//! [`ExchangeRequest`] to an [`HttpHost`] and awaits the
//! [`ExchangeResponse`]. One concrete binding is chosen per deployment
//! target; the optional `reqwest` feature provides one for native hosts.
//!
//! # Contract
//!
//! - The returned future performs no I/O until first polled.
//! - Dropping the future cancels the exchange. The connection relies on this
//!   to abort outstanding exchanges on disconnect.
//! - Any non-2xx status is reported as a normal [`ExchangeResponse`]; only
//!   failures to complete the exchange at all are errors.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{ExchangeRequest, ExchangeResponse};

// ============================================================================
// HttpHost
// ============================================================================

/// Performs HTTP exchanges on behalf of the connection.
#[async_trait]
pub trait HttpHost: Send + Sync + 'static {
    /// Performs one exchange.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TransportFailure`] if no response was obtained.
    async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeResponse>;
}

// ============================================================================
// ReqwestHost
// ============================================================================

#[cfg(feature = "reqwest")]
pub use self::reqwest_host::ReqwestHost;

#[cfg(feature = "reqwest")]
mod reqwest_host {
    use async_trait::async_trait;
    use tracing::trace;

    use crate::error::{Error, Result};
    use crate::protocol::{ExchangeRequest, ExchangeResponse};

    use super::HttpHost;

    /// [`HttpHost`] backed by a [`reqwest::Client`].
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestHost {
        client: reqwest::Client,
    }

    impl ReqwestHost {
        /// Creates a host with a default client.
        #[inline]
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a host around an existing client.
        #[inline]
        #[must_use]
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl HttpHost for ReqwestHost {
        async fn exchange(&self, request: ExchangeRequest) -> Result<ExchangeResponse> {
            trace!(url = %request.url, action = %request.action, "Performing exchange");

            let mut builder = self.client.post(request.url.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder
                .body(request.body)
                .send()
                .await
                .map_err(|e| Error::transport_failure(e.to_string()))?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| Error::transport_failure(e.to_string()))?;

            Ok(ExchangeResponse::new(status, body))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
