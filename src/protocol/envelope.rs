//! Envelope type and its wire codec.
//!
//! Every message in either direction is a two-element JSON array
//! `[actionName, actionArgs]`:
//!
//! | Action | Args |
//! |--------|------|
//! | `noop` | `[]` |
//! | `call` | `[functionName, requestId, positionalArgs]` |
//! | `respond` | `[responseId, success, valueOrError]` |
//! | `close` | `[]` |
//!
//! Decoding is strict: wrong arity, wrong element types or an unknown
//! action name produce [`Error::Protocol`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;

// ============================================================================
// ActionKind
// ============================================================================

/// The four action kinds, also used as the `action` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Keepalive, no payload.
    Noop,
    /// Invoke a function on the other side.
    Call,
    /// Reply to an earlier call.
    Respond,
    /// Terminate the session.
    Close,
}

impl ActionKind {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Call => "call",
            Self::Respond => "respond",
            Self::Close => "close",
        }
    }

    /// Looks up a wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "noop" => Some(Self::Noop),
            "call" => Some(Self::Call),
            "respond" => Some(Self::Respond),
            "close" => Some(Self::Close),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// The wire unit exchanged in both directions.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Nothing to do.
    Noop,

    /// Invoke an exported function.
    Call {
        /// Name in the receiver's export table.
        function: String,
        /// Id the reply must carry.
        request_id: CorrelationId,
        /// Positional arguments.
        args: Vec<Value>,
    },

    /// Reply to a call.
    Respond {
        /// Id of the call being answered.
        response_id: CorrelationId,
        /// Whether `value` is a result or an error.
        success: bool,
        /// Returned value or reported error.
        value: Value,
    },

    /// Peer is closing the session.
    Close,
}

impl Envelope {
    /// Returns the action kind of this envelope.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Noop => ActionKind::Noop,
            Self::Call { .. } => ActionKind::Call,
            Self::Respond { .. } => ActionKind::Respond,
            Self::Close => ActionKind::Close,
        }
    }

    /// Converts the envelope into its JSON array form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Noop | Self::Close => json!([self.kind().as_str(), []]),
            Self::Call {
                function,
                request_id,
                args,
            } => json!(["call", [function, request_id.as_str(), args]]),
            Self::Respond {
                response_id,
                success,
                value,
            } => json!(["respond", [response_id.as_str(), success, value]]),
        }
    }

    /// Parses the JSON array form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] on any structural mismatch.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(mut outer) = value else {
            return Err(Error::protocol("envelope is not an array"));
        };
        if outer.len() != 2 {
            return Err(Error::protocol(format!(
                "envelope has {} elements, expected 2",
                outer.len()
            )));
        }

        let args = outer.pop().unwrap_or_default();
        let name = outer.pop().unwrap_or_default();

        let Value::String(name) = name else {
            return Err(Error::protocol("action name is not a string"));
        };
        let kind = ActionKind::from_name(&name)
            .ok_or_else(|| Error::protocol(format!("unknown action: {name}")))?;
        let Value::Array(args) = args else {
            return Err(Error::protocol(format!("arguments of {kind} are not an array")));
        };

        match kind {
            ActionKind::Noop => expect_arity(kind, &args, 0).map(|()| Self::Noop),
            ActionKind::Close => expect_arity(kind, &args, 0).map(|()| Self::Close),
            ActionKind::Call => {
                expect_arity(kind, &args, 3)?;
                let mut args = args.into_iter();
                let function = take_string(kind, args.next(), "function name")?;
                let request_id = take_string(kind, args.next(), "request id")?;
                let Some(Value::Array(call_args)) = args.next() else {
                    return Err(Error::protocol("call arguments are not an array"));
                };
                Ok(Self::Call {
                    function,
                    request_id: CorrelationId::from_peer(request_id),
                    args: call_args,
                })
            }
            ActionKind::Respond => {
                expect_arity(kind, &args, 3)?;
                let mut args = args.into_iter();
                let response_id = take_string(kind, args.next(), "response id")?;
                let Some(Value::Bool(success)) = args.next() else {
                    return Err(Error::protocol("respond success flag is not a boolean"));
                };
                Ok(Self::Respond {
                    response_id: CorrelationId::from_peer(response_id),
                    success,
                    value: args.next().unwrap_or_default(),
                })
            }
        }
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Encodes an envelope to its wire text.
#[must_use]
pub fn encode(envelope: &Envelope) -> String {
    envelope.to_value().to_string()
}

/// Decodes wire text into an envelope.
///
/// # Errors
///
/// - [`Error::Json`] if the text is not JSON
/// - [`Error::Protocol`] if the JSON is not a valid envelope
pub fn decode(text: &str) -> Result<Envelope> {
    let value: Value = serde_json::from_str(text)?;
    Envelope::from_value(value)
}

// ============================================================================
// Helpers
// ============================================================================

fn expect_arity(kind: ActionKind, args: &[Value], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Error::protocol(format!(
            "{kind} takes {expected} arguments, got {}",
            args.len()
        )))
    }
}

fn take_string(kind: ActionKind, value: Option<Value>, what: &str) -> Result<String> {
    match value {
        Some(Value::String(s)) => Ok(s),
        _ => Err(Error::protocol(format!("{kind} {what} is not a string"))),
    }
}

// ============================================================================
// Tests
// ============================================================================
