//! tb-bridge: Bridge between a payment-terminal capability and a backend
//!
//! The bridge keeps one WebSocket channel open to a remote control backend.
//! Requests from the backend are dispatched to named members of a local
//! capability object; the capability can in turn ask the backend for data
//! through [`BridgeHooks`]. When the channel drops, the supervisor rebuilds
//! the client from scratch after a fixed delay.

pub mod client;
pub mod context;
pub mod hooks;
pub mod pending;
pub mod simulated;
pub mod supervisor;

pub use client::{BridgeClient, CapabilityFactory, ChannelState, SessionEnd};
pub use context::BridgeContext;
pub use hooks::BridgeHooks;
pub use pending::PendingResponses;
pub use simulated::SimulatedTerminal;
pub use supervisor::{RestartPolicy, Supervisor};
