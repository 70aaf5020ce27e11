//! tb-protocol: Wire protocol for the terminal bridge
//!
//! This crate defines the JSON messages exchanged between the bridge and
//! the remote control backend over a WebSocket text channel.

pub mod codec;
pub mod correlation;
pub mod error;
pub mod message;

pub use codec::{decode_inbound, encode};
pub use correlation::CorrelationId;
pub use error::ProtocolError;
pub use message::{
    ErrorKind, ErrorPayload, Inbound, Request, Response, CONNECTION_TOKEN,
    UNEXPECTED_READER_DISCONNECT,
};
