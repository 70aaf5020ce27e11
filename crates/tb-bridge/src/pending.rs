//! Pending response table
//!
//! Correlates responses arriving on the channel with the callers that are
//! waiting for them. Every outbound request arms its own one-shot slot, so
//! two fetches of the same attribute can never see each other's values.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use tb_core::BridgeError;
use tb_protocol::{CorrelationId, Response};

/// Table of armed slots and values nobody has asked for yet
#[derive(Debug, Default)]
pub struct PendingResponses {
    inner: Mutex<Table>,
}

#[derive(Debug, Default)]
struct Table {
    /// Armed slots per attribute, oldest first
    waiters: HashMap<String, VecDeque<Slot>>,
    /// Latest response per attribute that arrived with no slot to receive it
    unclaimed: HashMap<String, Value>,
    /// Set on teardown; no new slots may be armed
    closed: bool,
}

#[derive(Debug)]
struct Slot {
    id: CorrelationId,
    tx: oneshot::Sender<Value>,
}

/// Receiving end of one armed slot
#[derive(Debug)]
pub struct Waiter {
    id: CorrelationId,
    attribute: String,
    rx: oneshot::Receiver<Value>,
}

impl Waiter {
    /// Correlation identifier to put on the outbound request
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Attribute this slot waits on
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Suspend until the slot is resolved.
    ///
    /// Fails with `ChannelClosed` when the table is torn down first.
    pub async fn wait(self) -> Result<Value, BridgeError> {
        self.rx.await.map_err(|_| BridgeError::ChannelClosed)
    }
}

impl PendingResponses {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a slot for the next response to `attribute`
    pub async fn register(&self, attribute: &str) -> Result<Waiter, BridgeError> {
        let mut table = self.inner.lock().await;
        table.arm(attribute)
    }

    /// Deliver a response to its waiter.
    ///
    /// A response carrying an `id` goes to the slot with that id; one that
    /// matches no slot is stale and dropped. A response without an `id`
    /// goes to the oldest slot for its attribute, or is kept until someone
    /// asks for it. Only the latest kept value per attribute survives.
    pub async fn resolve(&self, response: Response) {
        let Response {
            attribute,
            result,
            id,
        } = response;
        let mut guard = self.inner.lock().await;
        let table = &mut *guard;

        let Some(queue) = table.waiters.get_mut(&attribute) else {
            if id.is_some() {
                tracing::warn!(%attribute, "Dropping response with no waiting caller");
            } else {
                table.park(attribute, result);
            }
            return;
        };

        let mut result = result;
        match id {
            Some(id) => {
                let Some(position) = queue.iter().position(|slot| slot.id == id) else {
                    tracing::warn!(%attribute, %id, "Dropping response for unknown correlation id");
                    return;
                };
                if let Some(slot) = queue.remove(position) {
                    if slot.tx.send(result).is_err() {
                        tracing::debug!(%attribute, %id, "Waiter went away before its response");
                    }
                }
            }
            None => loop {
                let Some(slot) = queue.pop_front() else {
                    table.park(attribute.clone(), result);
                    break;
                };
                match slot.tx.send(result) {
                    Ok(()) => break,
                    // Caller gave up; offer the value to the next one
                    Err(value) => result = value,
                }
            },
        }

        if table
            .waiters
            .get(&attribute)
            .is_some_and(VecDeque::is_empty)
        {
            table.waiters.remove(&attribute);
        }
    }

    /// Generic wait-for-value: consume a parked value for `attribute`, or
    /// arm a slot and suspend until one arrives.
    pub async fn take_or_wait(&self, attribute: &str) -> Result<Value, BridgeError> {
        let waiter = {
            let mut table = self.inner.lock().await;
            if let Some(value) = table.take_unclaimed(attribute) {
                return Ok(value);
            }
            table.arm(attribute)?
        };
        waiter.wait().await
    }

    /// Disarm a slot whose request never went out
    pub async fn cancel(&self, waiter: &Waiter) {
        let mut table = self.inner.lock().await;
        if let Some(queue) = table.waiters.get_mut(&waiter.attribute) {
            queue.retain(|slot| slot.id != waiter.id);
            if queue.is_empty() {
                table.waiters.remove(&waiter.attribute);
            }
        }
    }

    /// Fail every waiter and refuse new slots
    pub async fn close(&self) {
        let mut table = self.inner.lock().await;
        table.closed = true;
        let dropped: usize = table.waiters.drain().map(|(_, queue)| queue.len()).sum();
        table.unclaimed.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "Failed pending waiters on teardown");
        }
    }

    /// Number of armed slots
    pub async fn len(&self) -> usize {
        let table = self.inner.lock().await;
        table.waiters.values().map(VecDeque::len).sum()
    }

    /// Check whether no slot is armed
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[cfg(test)]
    async fn unclaimed_len(&self) -> usize {
        self.inner.lock().await.unclaimed.len()
    }
}

impl Table {
    fn arm(&mut self, attribute: &str) -> Result<Waiter, BridgeError> {
        if self.closed {
            return Err(BridgeError::ChannelClosed);
        }
        let (tx, rx) = oneshot::channel();
        let id = CorrelationId::new();
        self.waiters
            .entry(attribute.to_string())
            .or_default()
            .push_back(Slot { id: id.clone(), tx });
        Ok(Waiter {
            id,
            attribute: attribute.to_string(),
            rx,
        })
    }

    fn park(&mut self, attribute: String, value: Value) {
        if self.unclaimed.insert(attribute.clone(), value).is_some() {
            tracing::debug!(%attribute, "Replacing unclaimed response");
        } else {
            tracing::debug!(%attribute, "Parking unclaimed response");
        }
    }

    fn take_unclaimed(&mut self, attribute: &str) -> Option<Value> {
        self.unclaimed.remove(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn response(attribute: &str, result: Value, id: Option<&CorrelationId>) -> Response {
        Response {
            attribute: attribute.to_string(),
            result,
            id: id.cloned(),
        }
    }

    #[tokio::test]
    async fn test_resolve_by_id() {
        let table = PendingResponses::new();
        let first = table.register("connection_token").await.unwrap();
        let second = table.register("connection_token").await.unwrap();

        table
            .resolve(response("connection_token", json!("b"), Some(second.id())))
            .await;
        table
            .resolve(response("connection_token", json!("a"), Some(first.id())))
            .await;

        assert_eq!(first.wait().await.unwrap(), json!("a"));
        assert_eq!(second.wait().await.unwrap(), json!("b"));
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_resolve_without_id_is_fifo() {
        let table = PendingResponses::new();
        let first = table.register("x").await.unwrap();
        let second = table.register("x").await.unwrap();

        table.resolve(response("x", json!(1), None)).await;
        table.resolve(response("x", json!(2), None)).await;

        assert_eq!(first.wait().await.unwrap(), json!(1));
        assert_eq!(second.wait().await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_values_are_consumed_not_cached() {
        let table = PendingResponses::new();
        table.resolve(response("x", json!("old"), None)).await;

        assert_eq!(table.take_or_wait("x").await.unwrap(), json!("old"));

        let table = Arc::new(table);
        let reader = {
            let table = Arc::clone(&table);
            tokio::spawn(async move { table.take_or_wait("x").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        table.resolve(response("x", json!("new"), None)).await;
        assert_eq!(reader.await.unwrap().unwrap(), json!("new"));
    }

    #[tokio::test]
    async fn test_unclaimed_keeps_latest_value_only() {
        let table = PendingResponses::new();
        for n in 0..1000 {
            table
                .resolve(response("connection_token", json!(n), None))
                .await;
        }
        table.resolve(response("other", json!("o"), None)).await;
        assert_eq!(table.unclaimed_len().await, 2);

        assert_eq!(
            table.take_or_wait("connection_token").await.unwrap(),
            json!(999)
        );
        assert_eq!(table.unclaimed_len().await, 1);
        assert_eq!(table.take_or_wait("other").await.unwrap(), json!("o"));
        assert_eq!(table.unclaimed_len().await, 0);
    }

    #[tokio::test]
    async fn test_null_result_resolves() {
        let table = PendingResponses::new();
        let waiter = table.register("unexpected_reader_disconnect").await.unwrap();
        table
            .resolve(response("unexpected_reader_disconnect", Value::Null, None))
            .await;
        assert_eq!(waiter.wait().await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_stale_id_is_dropped() {
        let table = PendingResponses::new();
        let waiter = table.register("x").await.unwrap();
        let stale = CorrelationId::new();

        table.resolve(response("x", json!("stale"), Some(&stale))).await;
        assert_eq!(table.len().await, 1);

        table.resolve(response("x", json!("fresh"), Some(waiter.id()))).await;
        assert_eq!(waiter.wait().await.unwrap(), json!("fresh"));
    }

    #[tokio::test]
    async fn test_dropped_waiter_passes_value_on() {
        let table = PendingResponses::new();
        let gone = table.register("x").await.unwrap();
        let alive = table.register("x").await.unwrap();
        drop(gone);

        table.resolve(response("x", json!(7), None)).await;
        assert_eq!(alive.wait().await.unwrap(), json!(7));
    }

    #[tokio::test]
    async fn test_cancel_disarms_slot() {
        let table = PendingResponses::new();
        let waiter = table.register("x").await.unwrap();
        table.cancel(&waiter).await;
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let table = PendingResponses::new();
        let waiter = table.register("x").await.unwrap();
        table.close().await;

        assert!(matches!(waiter.wait().await, Err(BridgeError::ChannelClosed)));
        assert!(matches!(
            table.register("x").await,
            Err(BridgeError::ChannelClosed)
        ));
    }
}
