//! Explicit registry of capability members

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use super::capability::CallArgs;
use crate::error::{CapabilityError, InvocationError};

/// Outcome of a member invocation
pub type MethodResult = Result<Value, InvocationError>;

/// Member that completes synchronously
pub type SyncHandler = Arc<dyn Fn(CallArgs) -> MethodResult + Send + Sync>;

/// Member that returns a pending computation
pub type AsyncHandler = Arc<dyn Fn(CallArgs) -> BoxFuture<'static, MethodResult> + Send + Sync>;

/// Plain value read without invocation
pub type PropertyGetter = Arc<dyn Fn() -> Value + Send + Sync>;

/// A named entry on a capability object
#[derive(Clone)]
pub enum Member {
    /// Synchronous method
    Method(SyncHandler),
    /// Asynchronous method
    AsyncMethod(AsyncHandler),
    /// Read-only property
    Property(PropertyGetter),
}

impl Member {
    fn kind(&self) -> &'static str {
        match self {
            Self::Method(_) => "method",
            Self::AsyncMethod(_) => "async method",
            Self::Property(_) => "property",
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Attribute name to member mapping for one capability object
#[derive(Debug, Default, Clone)]
pub struct MemberRegistry {
    members: BTreeMap<String, Member>,
}

impl MemberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a capability object
    pub fn from_capability<C: super::Capability + ?Sized>(capability: Arc<C>) -> Self {
        let mut registry = Self::new();
        capability.register(&mut registry);
        registry
    }

    /// Register a synchronous method
    pub fn method<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(CallArgs) -> MethodResult + Send + Sync + 'static,
    {
        self.insert(name.into(), Member::Method(Arc::new(handler)))
    }

    /// Register an asynchronous method
    pub fn async_method<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        let handler: AsyncHandler =
            Arc::new(move |args: CallArgs| -> BoxFuture<'static, MethodResult> {
                Box::pin(handler(args))
            });
        self.insert(name.into(), Member::AsyncMethod(handler))
    }

    /// Register a property
    pub fn property<F>(&mut self, name: impl Into<String>, getter: F) -> &mut Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.insert(name.into(), Member::Property(Arc::new(getter)))
    }

    fn insert(&mut self, name: String, member: Member) -> &mut Self {
        if let Some(previous) = self.members.insert(name.clone(), member) {
            tracing::warn!(member = %name, replaced = previous.kind(), "Member registered twice");
        }
        self
    }

    /// Look up a member by attribute name
    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Check whether a member is registered
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Number of registered members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Fail unless every name in `required` is registered
    pub fn require<I, S>(&self, capability: &str, required: I) -> Result<(), CapabilityError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let missing: Vec<String> = required
            .into_iter()
            .filter_map(|name| {
                let name: &str = name.as_ref();
                (!self.contains(name)).then(|| name.to_string())
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CapabilityError::MissingMembers {
                capability: capability.to_string(),
                missing,
            })
        }
    }
}
