//! tb-core: Core abstractions and configuration for the terminal bridge
//!
//! This crate provides the error types, configuration structures and the
//! capability contract shared by the bridge library and binary.

pub mod config;
pub mod error;
pub mod traits;

pub use error::{BridgeError, CapabilityError, ConfigError, ConnectionError, InvocationError};
pub use traits::{CallArgs, Capability, Member, MemberRegistry, MethodResult};
