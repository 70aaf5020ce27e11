//! Inbound request dispatch

use serde_json::Value;

use tb_core::{CallArgs, Member, MemberRegistry};
use tb_protocol::{ErrorKind, ErrorPayload, Request};

/// Run one inbound request against the registry and build the reply.
///
/// Always produces exactly one value: the member's result, the property
/// value, or an `{"error": [kind, message]}` payload.
pub async fn dispatch(registry: &MemberRegistry, request: &Request) -> Value {
    let attribute = request.attribute.as_str();

    let Some(member) = registry.get(attribute) else {
        tracing::warn!(%attribute, "Request for unknown attribute");
        return ErrorPayload::new(
            ErrorKind::UnknownAttribute,
            format!("capability has no member '{}'", attribute),
        )
        .to_value();
    };

    let outcome = match member {
        Member::Property(getter) => return getter(),
        Member::Method(handler) => handler(CallArgs::from_request(request)),
        Member::AsyncMethod(handler) => {
            let pending = handler(CallArgs::from_request(request));
            pending.await
        }
    };

    match outcome {
        Ok(value) => {
            tracing::debug!(%attribute, "Request completed");
            value
        }
        Err(e) => {
            tracing::warn!(%attribute, kind = %e.kind, "Invocation failed: {}", e.message);
            e.to_payload().to_value()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tb_core::InvocationError;

    fn registry(calls: Arc<AtomicUsize>) -> MemberRegistry {
        let mut registry = MemberRegistry::new();
        let property_reads = Arc::clone(&calls);
        registry
            .method("echo", |args: CallArgs| Ok(Value::Array(args.into_inner())))
            .async_method("delayed", |args: CallArgs| async move {
                tokio::task::yield_now().await;
                Ok::<_, InvocationError>(json!({"count": args.positional().len()}))
            })
            .method("fail", |_args| {
                Err(InvocationError::new(
                    ErrorKind::NoEstablishedConnection,
                    "no reader connected",
                ))
            })
            .property("sdkVersion", move || {
                property_reads.fetch_add(1, Ordering::SeqCst);
                json!("1.2.3")
            });
        registry
    }

    #[tokio::test]
    async fn test_sync_method_gets_trailing_kwargs() {
        let registry = registry(Arc::default());
        let request: Request = serde_json::from_value(json!({
            "attribute": "echo",
            "args": [1, "two"],
            "kwargs": {"simulated": true}
        }))
        .unwrap();

        assert_eq!(
            dispatch(&registry, &request).await,
            json!([1, "two", {"simulated": true}])
        );
    }

    #[tokio::test]
    async fn test_async_method_resolves() {
        let registry = registry(Arc::default());
        let request = Request::new("delayed").with_args(vec![json!(1), json!(2)]);
        assert_eq!(dispatch(&registry, &request).await, json!({"count": 2}));
    }

    #[tokio::test]
    async fn test_failure_becomes_error_payload() {
        let registry = registry(Arc::default());
        assert_eq!(
            dispatch(&registry, &Request::new("fail")).await,
            json!({"error": ["no_established_connection", "no reader connected"]})
        );
    }

    #[tokio::test]
    async fn test_property_is_read_not_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry(Arc::clone(&calls));
        let request = Request::new("sdkVersion").with_args(vec![json!("ignored")]);

        assert_eq!(dispatch(&registry, &request).await, json!("1.2.3"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_attribute() {
        let registry = registry(Arc::default());
        let reply = dispatch(&registry, &Request::new("collectPaymentMethod")).await;
        assert_eq!(reply["error"][0], json!("unknown_attribute"));
    }
}
