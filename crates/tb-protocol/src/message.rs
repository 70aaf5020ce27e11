//! Message types for the terminal bridge protocol
//!
//! Every frame on the channel is a single JSON text message. Requests may
//! flow in both directions; responses are told apart from requests by the
//! presence of a `result` field.
//!
//! # Message Flow
//!
//! 1. Backend sends a `Request` naming a capability member (`attribute`)
//! 2. Bridge invokes the member and replies with the raw result value, or
//!    with an `ErrorPayload` when the invocation fails
//! 3. When the capability needs data from the backend (a connection token,
//!    or to report a reader disconnect), the bridge sends its own `Request`
//!    tagged with a correlation `id`
//! 4. Backend replies with a `Response` carrying the same `attribute` (and
//!    ideally the same `id`), which wakes the waiting caller

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::correlation::CorrelationId;

/// Attribute the bridge sends to obtain a terminal connection token
pub const CONNECTION_TOKEN: &str = "connection_token";

/// Attribute the bridge sends when the reader disconnects unexpectedly
pub const UNEXPECTED_READER_DISCONNECT: &str = "unexpected_reader_disconnect";

/// A remote procedure request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Name of the member to invoke or read
    pub attribute: String,
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword arguments
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    /// Correlation identifier, set on requests the bridge originates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CorrelationId>,
}

impl Request {
    /// Create a request with no arguments
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            args: Vec::new(),
            kwargs: Map::new(),
            id: None,
        }
    }

    /// Set the positional arguments
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Set the keyword arguments
    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    /// Tag the request with a correlation identifier
    pub fn with_id(mut self, id: CorrelationId) -> Self {
        self.id = Some(id);
        self
    }

    /// Arguments in bridge calling convention: the positional arguments
    /// followed by one trailing element holding the keyword mapping.
    ///
    /// The trailing mapping is always present, even when empty.
    pub fn call_args(&self) -> Vec<Value> {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.extend(self.args.iter().cloned());
        args.push(Value::Object(self.kwargs.clone()));
        args
    }
}

/// A response to a request the bridge originated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Attribute of the request being answered
    pub attribute: String,
    /// Result value
    pub result: Value,
    /// Correlation identifier echoed by the peer, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CorrelationId>,
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Answer to one of our requests
    Response(Response),
    /// Request initiated by the peer
    Request(Request),
}

/// Failure reply: serialized as `{"error": [kind, message]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: (ErrorKind, String),
}

impl ErrorPayload {
    /// Create a new error payload
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: (kind, message.into()),
        }
    }

    /// Error kind
    pub fn kind(&self) -> &ErrorKind {
        &self.error.0
    }

    /// Error message
    pub fn message(&self) -> &str {
        &self.error.1
    }

    /// Convert into a JSON value
    pub fn to_value(&self) -> Value {
        Value::Object(Map::from_iter([(
            "error".to_string(),
            Value::Array(vec![
                Value::String(self.error.0.as_str().to_string()),
                Value::String(self.error.1.clone()),
            ]),
        )]))
    }
}

/// Kind names carried in error replies.
///
/// The named variants are the error codes raised by the payment terminal
/// SDK, plus two raised by the bridge itself. Any other name is kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorKind {
    NoEstablishedConnection,
    NoActiveCollectPaymentMethodAttempt,
    NoActiveReadReusableCardAttempt,
    Canceled,
    CancelableAlreadyCanceled,
    NetworkError,
    NetworkTimeout,
    AlreadyConnected,
    FailedFetchConnectionToken,
    DiscoveredTooManyReaders,
    InvalidReaderVersion,
    ReaderError,
    CommandAlreadyInProgress,
    /// Generic SDK error
    Error,
    /// The requested attribute is not registered on the capability
    UnknownAttribute,
    /// Arguments did not match what the member expects
    InvalidArguments,
    /// Unrecognised kind name
    Other(String),
}

impl ErrorKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoEstablishedConnection => "no_established_connection",
            Self::NoActiveCollectPaymentMethodAttempt => {
                "no_active_collect_payment_method_attempt"
            }
            Self::NoActiveReadReusableCardAttempt => "no_active_read_reusable_card_attempt",
            Self::Canceled => "canceled",
            Self::CancelableAlreadyCanceled => "cancelable_already_canceled",
            Self::NetworkError => "network_error",
            Self::NetworkTimeout => "network_timeout",
            Self::AlreadyConnected => "already_connected",
            Self::FailedFetchConnectionToken => "failed_fetch_connection_token",
            Self::DiscoveredTooManyReaders => "discovered_too_many_readers",
            Self::InvalidReaderVersion => "invalid_reader_version",
            Self::ReaderError => "reader_error",
            Self::CommandAlreadyInProgress => "command_already_in_progress",
            Self::Error => "Error",
            Self::UnknownAttribute => "unknown_attribute",
            Self::InvalidArguments => "invalid_arguments",
            Self::Other(name) => name,
        }
    }

    /// Parse a wire name
    pub fn from_name(name: &str) -> Self {
        match name {
            "no_established_connection" => Self::NoEstablishedConnection,
            "no_active_collect_payment_method_attempt" => {
                Self::NoActiveCollectPaymentMethodAttempt
            }
            "no_active_read_reusable_card_attempt" => Self::NoActiveReadReusableCardAttempt,
            "canceled" => Self::Canceled,
            "cancelable_already_canceled" => Self::CancelableAlreadyCanceled,
            "network_error" => Self::NetworkError,
            "network_timeout" => Self::NetworkTimeout,
            "already_connected" => Self::AlreadyConnected,
            "failed_fetch_connection_token" => Self::FailedFetchConnectionToken,
            "discovered_too_many_readers" => Self::DiscoveredTooManyReaders,
            "invalid_reader_version" => Self::InvalidReaderVersion,
            "reader_error" => Self::ReaderError,
            "command_already_in_progress" => Self::CommandAlreadyInProgress,
            "Error" => Self::Error,
            "unknown_attribute" => Self::UnknownAttribute,
            "invalid_arguments" => Self::InvalidArguments,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ErrorKind {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl From<ErrorKind> for String {
    fn from(kind: ErrorKind) -> Self {
        kind.as_str().to_string()
    }
}
