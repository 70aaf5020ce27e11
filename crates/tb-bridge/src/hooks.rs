//! Hooks handed to the capability object
//!
//! The capability cannot see the channel directly. When it needs something
//! from the backend it calls one of these hooks, which sends a tagged
//! request and suspends until the matching response is delivered.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, watch};

use tb_core::BridgeError;
use tb_protocol::{encode, ProtocolError, Request, CONNECTION_TOKEN, UNEXPECTED_READER_DISCONNECT};

use crate::client::ChannelState;
use crate::pending::PendingResponses;

/// Handle through which a capability object talks back to the backend
#[derive(Debug, Clone)]
pub struct BridgeHooks {
    outbound: mpsc::Sender<String>,
    pending: Arc<PendingResponses>,
    state: watch::Receiver<ChannelState>,
}

impl BridgeHooks {
    pub(crate) fn new(
        outbound: mpsc::Sender<String>,
        pending: Arc<PendingResponses>,
        state: watch::Receiver<ChannelState>,
    ) -> Self {
        Self {
            outbound,
            pending,
            state,
        }
    }

    /// Current channel state
    pub fn channel_state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Suspend until the channel is open.
    ///
    /// Fails with `ChannelClosed` if the channel closes before opening.
    pub async fn wait_ready(&self) -> Result<(), BridgeError> {
        let mut state = self.state.clone();
        let current = *state
            .wait_for(|state| *state != ChannelState::Connecting)
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;

        match current {
            ChannelState::Open => Ok(()),
            _ => Err(BridgeError::ChannelClosed),
        }
    }

    /// Send a request to the backend and wait for its response
    pub async fn request(
        &self,
        attribute: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        self.wait_ready().await?;

        let waiter = self.pending.register(attribute).await?;
        let request = Request::new(attribute)
            .with_args(args)
            .with_kwargs(kwargs)
            .with_id(waiter.id().clone());
        let frame = encode(&request)?;

        if self.outbound.send(frame).await.is_err() {
            self.pending.cancel(&waiter).await;
            return Err(BridgeError::ChannelClosed);
        }

        tracing::debug!(%attribute, id = %waiter.id(), "Awaiting response from backend");
        waiter.wait().await
    }

    /// Fetch a connection token from the backend.
    ///
    /// Each call sends its own request, so the terminal may call this
    /// again whenever its token expires.
    pub async fn fetch_connection_token(&self) -> Result<String, BridgeError> {
        let result = self
            .request(CONNECTION_TOKEN, Vec::new(), Map::new())
            .await?;

        match result.get("secret") {
            Some(Value::String(secret)) => Ok(secret.clone()),
            _ => Err(ProtocolError::InvalidField {
                field: "secret",
                reason: format!("connection token response has no string secret: {}", result),
            }
            .into()),
        }
    }

    /// Tell the backend the reader disconnected and wait for it to answer
    pub async fn on_unexpected_reader_disconnect(&self) -> Result<Value, BridgeError> {
        tracing::warn!("Reader disconnected unexpectedly, notifying backend");
        self.request(UNEXPECTED_READER_DISCONNECT, Vec::new(), Map::new())
            .await
    }

    /// Wait for a value the backend sent for `attribute` without being asked
    pub async fn get(&self, attribute: &str) -> Result<Value, BridgeError> {
        self.pending.take_or_wait(attribute).await
    }
}
