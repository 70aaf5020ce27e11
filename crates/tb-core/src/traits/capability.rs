//! Capability object contract

use std::sync::Arc;

use serde_json::{Map, Value};
use tb_protocol::Request;

use super::registry::MemberRegistry;

/// A local object whose members can be invoked by the remote peer.
///
/// Implementations declare their surface explicitly by registering named
/// members. Nothing outside the registry is reachable from the channel.
pub trait Capability: Send + Sync + 'static {
    /// Human-readable name, used in logs and validation errors
    fn name(&self) -> &str;

    /// Register every member this object exposes
    fn register(self: Arc<Self>, registry: &mut MemberRegistry);
}

/// Arguments handed to a member: the positional arguments of the request
/// followed by one trailing element holding the keyword mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs(Vec<Value>);

impl CallArgs {
    /// Wrap a raw argument vector already in bridge calling convention
    pub fn new(args: Vec<Value>) -> Self {
        Self(args)
    }

    /// Build the arguments for a request
    pub fn from_request(request: &Request) -> Self {
        Self(request.call_args())
    }

    /// Positional arguments only
    pub fn positional(&self) -> &[Value] {
        match self.0.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// Positional argument at `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional().get(index)
    }

    /// Keyword mapping from the trailing slot; `None` when the slot is
    /// missing or not an object.
    pub fn kwargs(&self) -> Option<&Map<String, Value>> {
        self.0.last().and_then(Value::as_object)
    }

    /// Keyword argument by name; JSON `null` counts as absent
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs()
            .and_then(|kwargs| kwargs.get(name))
            .filter(|value| !value.is_null())
    }

    /// Consume into the raw argument vector
    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}
