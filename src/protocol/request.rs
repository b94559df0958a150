//! HTTP framing of exchanges.
//!
//! Every exchange is a `POST` to the session's base URL with the action
//! kind in the `action` query parameter. The body is the JSON pair
//! `[positionalArgs, namedArgs]`, where `namedArgs` is always `{}`.
//!
//! # Headers
//!
//! | Header | Value | Sent with |
//! |--------|-------|-----------|
//! | `Livepage-Id` | session id | every exchange |
//! | `Content-Type` | `text/x-json+athena` | every exchange |
//! | `Request-Id` | correlation id | `call` |
//! | `Response-Id` | id being answered | `respond` |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value, json};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{CorrelationId, ObjectId, SessionId};

use super::envelope::{ActionKind, Envelope, decode};

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the session identifier.
pub const SESSION_HEADER: &str = "Livepage-Id";

/// Header carrying the id of an outbound call.
pub const REQUEST_ID_HEADER: &str = "Request-Id";

/// Header carrying the id of the call being answered.
pub const RESPONSE_ID_HEADER: &str = "Response-Id";

/// Content type marking this protocol's payload.
pub const CONTENT_TYPE: &str = "text/x-json+athena";

/// HTTP method of every exchange.
pub const METHOD: &str = "POST";

// ============================================================================
// ExchangeRequest
// ============================================================================

/// One outbound HTTP request, ready for the host to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRequest {
    /// Action kind carried by this request.
    pub action: ActionKind,

    /// Full URL including the `action` query parameter.
    pub url: Url,

    /// HTTP method (always `POST`).
    pub method: &'static str,

    /// Request headers in send order.
    pub headers: Vec<(String, String)>,

    /// JSON-encoded `[positionalArgs, namedArgs]`.
    pub body: String,
}

impl ExchangeRequest {
    /// Starts a request of the given kind with the common headers.
    fn new(base_url: &Url, session_id: &SessionId, action: ActionKind, args: Vec<Value>) -> Self {
        Self {
            action,
            url: action_url(base_url, action),
            method: METHOD,
            headers: vec![
                (SESSION_HEADER.to_string(), session_id.to_string()),
                ("Content-Type".to_string(), CONTENT_TYPE.to_string()),
            ],
            body: post_content(args),
        }
    }

    /// Builds a keepalive request.
    #[must_use]
    pub fn noop(base_url: &Url, session_id: &SessionId) -> Self {
        Self::new(base_url, session_id, ActionKind::Noop, Vec::new())
    }

    /// Builds a close notification.
    #[must_use]
    pub fn close(base_url: &Url, session_id: &SessionId) -> Self {
        Self::new(base_url, session_id, ActionKind::Close, Vec::new())
    }

    /// Builds an outbound call.
    ///
    /// Positional arguments are `[method, objectId, ...args]`.
    #[must_use]
    pub fn call(
        base_url: &Url,
        session_id: &SessionId,
        request_id: &CorrelationId,
        target: ObjectId,
        method: &str,
        args: Vec<Value>,
    ) -> Self {
        let mut positional = Vec::with_capacity(args.len() + 2);
        positional.push(Value::String(method.to_string()));
        positional.push(json!(target));
        positional.extend(args);

        let mut request = Self::new(base_url, session_id, ActionKind::Call, positional);
        request
            .headers
            .push((REQUEST_ID_HEADER.to_string(), request_id.to_string()));
        request
    }

    /// Builds a reply to an inbound call.
    ///
    /// Positional arguments are `[[success, value]]`.
    #[must_use]
    pub fn respond(
        base_url: &Url,
        session_id: &SessionId,
        response_id: &CorrelationId,
        success: bool,
        value: Value,
    ) -> Self {
        let mut request = Self::new(
            base_url,
            session_id,
            ActionKind::Respond,
            vec![json!([success, value])],
        );
        request
            .headers
            .push((RESPONSE_ID_HEADER.to_string(), response_id.to_string()));
        request
    }

    /// Returns the value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parses the body back into positional arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the body is not a `[array, object]` pair.
    pub fn positional_args(&self) -> Result<Vec<Value>> {
        match serde_json::from_str::<Value>(&self.body)? {
            Value::Array(mut pair) if pair.len() == 2 => match pair.swap_remove(0) {
                Value::Array(args) => Ok(args),
                _ => Err(Error::protocol("positional arguments are not an array")),
            },
            _ => Err(Error::protocol("request body is not an [args, kwargs] pair")),
        }
    }
}

// ============================================================================
// ExchangeResponse
// ============================================================================

/// What the host got back from an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response body text.
    pub body: String,
}

impl ExchangeResponse {
    /// Creates a response.
    #[inline]
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a `200` response carrying one envelope.
    #[must_use]
    pub fn envelope(envelope: &Envelope) -> Self {
        Self::new(200, super::envelope::encode(envelope))
    }

    /// Returns `true` for a 2xx status.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Extracts the envelope carried by the body.
    ///
    /// An empty body counts as `noop`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportFailure`] for a non-2xx status or a body
    /// that does not decode.
    pub fn into_envelope(self) -> Result<Envelope> {
        if !self.is_success() {
            return Err(Error::transport_failure(format!("HTTP status {}", self.status)));
        }
        if self.body.trim().is_empty() {
            return Ok(Envelope::Noop);
        }
        decode(&self.body).map_err(|e| Error::transport_failure(format!("undecodable body: {e}")))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Derives the transport base URL from a page location.
///
/// Query and fragment are stripped, a trailing `/` is ensured and
/// `transport` appended.
///
/// # Errors
///
/// Returns [`Error::Url`] if `location` is not an absolute URL.
pub fn base_url_from_location(location: &str) -> Result<Url> {
    let mut url = Url::parse(location)?;
    url.set_query(None);
    url.set_fragment(None);

    let mut path = url.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    path.push_str("transport");
    url.set_path(&path);
    Ok(url)
}

/// Builds the URL for one action kind.
fn action_url(base_url: &Url, action: ActionKind) -> Url {
    let mut url = base_url.clone();
    url.query_pairs_mut().append_pair("action", action.as_str());
    url
}

/// Serializes `[args, {}]`.
fn post_content(args: Vec<Value>) -> String {
    Value::Array(vec![Value::Array(args), Value::Object(Map::new())]).to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        base_url_from_location("http://example.com/private/page?x=1").expect("base url")
    }

    #[test]
    fn test_base_url_strips_query() {
        assert_eq!(base().as_str(), "http://example.com/private/page/transport");
    }

    #[test]
    fn test_base_url_existing_slash() {
        let url = base_url_from_location("https://example.com/app/#frag").expect("base url");
        assert_eq!(url.as_str(), "https://example.com/app/transport");
    }

    #[test]
    fn test_base_url_rejects_relative() {
        assert!(base_url_from_location("/relative/path").is_err());
    }

    #[test]
    fn test_noop_request() {
        let session = SessionId::new("abc");
        let request = ExchangeRequest::noop(&base(), &session);

        assert_eq!(request.method, "POST");
        assert_eq!(
            request.url.as_str(),
            "http://example.com/private/page/transport?action=noop"
        );
        assert_eq!(request.header("livepage-id"), Some("abc"));
        assert_eq!(request.header("content-type"), Some(CONTENT_TYPE));
        assert_eq!(request.header(REQUEST_ID_HEADER), None);
        assert_eq!(request.body, "[[],{}]");
    }

    #[test]
    fn test_action_appended_to_base_url() {
        let session = SessionId::new("abc");
        let base = Url::parse("http://example.com/live%20page/transport").expect("url");

        let request = ExchangeRequest::close(&base, &session);

        assert_eq!(
            request.url.as_str(),
            "http://example.com/live%20page/transport?action=close"
        );
        assert_eq!(request.url.query_pairs().count(), 1);
        assert_eq!(base.query(), None);
    }

    #[test]
    fn test_call_request() {
        let session = SessionId::new("abc");
        let id = CorrelationId::local(3);
        let request = ExchangeRequest::call(
            &base(),
            &session,
            &id,
            ObjectId::new(7),
            "ping",
            vec![json!(1)],
        );

        assert_eq!(request.action, ActionKind::Call);
        assert_eq!(request.header(REQUEST_ID_HEADER), Some("c2s3"));
        assert_eq!(request.header(RESPONSE_ID_HEADER), None);
        assert_eq!(request.body, r#"[["ping",7,1],{}]"#);
        assert_eq!(
            request.positional_args().expect("args"),
            vec![json!("ping"), json!(7), json!(1)]
        );
    }

    #[test]
    fn test_respond_request() {
        let session = SessionId::new("abc");
        let id = CorrelationId::from_peer("s2c9");
        let request = ExchangeRequest::respond(&base(), &session, &id, false, json!("nope"));

        assert!(request.url.as_str().ends_with("?action=respond"));
        assert_eq!(request.header(RESPONSE_ID_HEADER), Some("s2c9"));
        assert_eq!(request.body, r#"[[[false,"nope"]],{}]"#);
    }

    #[test]
    fn test_response_into_envelope() {
        let response = ExchangeResponse::envelope(&Envelope::Close);
        assert_eq!(response.into_envelope().expect("envelope"), Envelope::Close);

        let empty = ExchangeResponse::new(204, "");
        assert_eq!(empty.into_envelope().expect("envelope"), Envelope::Noop);
    }

    #[test]
    fn test_response_failures() {
        let err = ExchangeResponse::new(500, "oops").into_envelope().unwrap_err();
        assert!(err.is_transport_failure());

        let err = ExchangeResponse::new(200, "[\"bogus\", []]").into_envelope().unwrap_err();
        assert!(err.is_transport_failure());
    }
}
