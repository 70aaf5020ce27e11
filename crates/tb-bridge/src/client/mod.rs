//! Bridge client
//!
//! Owns one channel to the backend, one capability object, and the pending
//! response table. A client runs a single session: once the channel closes
//! it is torn down and the supervisor builds a fresh one.

mod connection;
mod dispatch;

pub use connection::ChannelState;
pub use dispatch::dispatch;

use std::fmt;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use tb_core::config::BridgeConfig;
use tb_core::{BridgeError, Capability, MemberRegistry};
use tb_protocol::{decode_inbound, encode, Inbound, Request};

use crate::hooks::BridgeHooks;
use crate::pending::PendingResponses;
use connection::BridgeConnection;

/// Builds a fresh capability object for each client
pub trait CapabilityFactory: Send + Sync + 'static {
    /// Create the capability, handing it the hooks it may call back into
    fn create(&self, hooks: BridgeHooks) -> Arc<dyn Capability>;
}

impl<F> CapabilityFactory for F
where
    F: Fn(BridgeHooks) -> Arc<dyn Capability> + Send + Sync + 'static,
{
    fn create(&self, hooks: BridgeHooks) -> Arc<dyn Capability> {
        self(hooks)
    }
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested
    Shutdown,
    /// Peer closed the channel
    Closed { code: Option<u16>, reason: String },
    /// Transport failure after the channel opened
    Failed(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown requested"),
            Self::Closed {
                code: Some(code),
                reason,
            } => write!(f, "closed by peer ({}): {}", code, reason),
            Self::Closed { code: None, reason } => write!(f, "closed by peer: {}", reason),
            Self::Failed(reason) => write!(f, "channel error: {}", reason),
        }
    }
}

/// One bridge session between the backend and a capability object
pub struct BridgeClient {
    config: BridgeConfig,
    capability: Arc<dyn Capability>,
    registry: Arc<MemberRegistry>,
    pending: Arc<PendingResponses>,
    hooks: BridgeHooks,
    state_tx: watch::Sender<ChannelState>,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: mpsc::Receiver<String>,
}

impl BridgeClient {
    /// Build the client and its capability object.
    ///
    /// Fails if the capability does not expose every member listed in
    /// `config.required_members`.
    pub fn new<F>(config: BridgeConfig, factory: &F) -> Result<Self, BridgeError>
    where
        F: CapabilityFactory + ?Sized,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let pending = Arc::new(PendingResponses::new());
        let hooks = BridgeHooks::new(outbound_tx.clone(), Arc::clone(&pending), state_rx);

        let capability = factory.create(hooks.clone());
        let registry = MemberRegistry::from_capability(Arc::clone(&capability));
        registry.require(capability.name(), &config.required_members)?;

        tracing::debug!(
            capability = capability.name(),
            members = registry.len(),
            "Capability registered"
        );

        Ok(Self {
            config,
            capability,
            registry: Arc::new(registry),
            pending,
            hooks,
            state_tx,
            outbound_tx,
            outbound_rx,
        })
    }

    /// Hooks bound to this client
    pub fn hooks(&self) -> BridgeHooks {
        self.hooks.clone()
    }

    /// Capability object owned by this client
    pub fn capability(&self) -> &Arc<dyn Capability> {
        &self.capability
    }

    /// Members reachable from the channel
    pub fn registry(&self) -> &MemberRegistry {
        &self.registry
    }

    /// Connect and serve until the channel closes or `shutdown` fires.
    ///
    /// Returns `Err` only when the connection could not be opened.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<SessionEnd, BridgeError> {
        let url = self.config.url();

        let connection = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                self.teardown(JoinSet::new()).await;
                return Ok(SessionEnd::Shutdown);
            }
            result = BridgeConnection::connect(&url) => match result {
                Ok(connection) => connection,
                Err(e) => {
                    self.teardown(JoinSet::new()).await;
                    return Err(e.into());
                }
            },
        };

        self.state_tx.send_replace(ChannelState::Open);
        tracing::info!(
            capability = self.capability.name(),
            "Connected to backend at {}",
            url
        );

        let (mut writer, mut reader) = connection.into_parts();
        let mut tasks: JoinSet<()> = JoinSet::new();

        let end = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    if let Err(e) = writer.send(Message::Close(None)).await {
                        tracing::debug!("Failed to send close frame: {}", e);
                    }
                    break SessionEnd::Shutdown;
                }

                frame = reader.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text, &mut tasks).await,
                    Some(Ok(Message::Binary(data))) => {
                        tracing::warn!(len = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                            None => (None, String::new()),
                        };
                        break SessionEnd::Closed { code, reason };
                    }
                    Some(Ok(_)) => {
                        // Ping/pong handled by tungstenite
                    }
                    Some(Err(e)) => break SessionEnd::Failed(e.to_string()),
                    None => {
                        break SessionEnd::Closed {
                            code: None,
                            reason: "stream ended".to_string(),
                        }
                    }
                },

                Some(frame) = self.outbound_rx.recv() => {
                    tracing::trace!(len = frame.len(), "Sending frame");
                    if let Err(e) = writer.send(Message::Text(frame)).await {
                        break SessionEnd::Failed(e.to_string());
                    }
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!("Request task panicked: {}", e);
                        }
                    }
                }
            }
        };

        tracing::info!(in_flight = tasks.len(), "Session ended: {}", end);
        self.teardown(tasks).await;
        Ok(end)
    }

    async fn handle_text(&self, text: &str, tasks: &mut JoinSet<()>) {
        let inbound = match decode_inbound(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::error!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        match inbound {
            Inbound::Response(response) => {
                tracing::debug!(attribute = %response.attribute, "Response received");
                self.pending.resolve(response).await;
            }
            Inbound::Request(request) => {
                tracing::debug!(attribute = %request.attribute, "Request received");
                self.spawn_request(request, tasks);
            }
        }
    }

    /// Handle a request in its own task so a slow member does not hold up
    /// the frames behind it.
    fn spawn_request(&self, request: Request, tasks: &mut JoinSet<()>) {
        let registry = Arc::clone(&self.registry);
        let outbound = self.outbound_tx.clone();

        tasks.spawn(async move {
            let reply = dispatch(&registry, &request).await;
            let frame = match encode(&reply) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(attribute = %request.attribute, "Failed to encode reply: {}", e);
                    return;
                }
            };
            if outbound.send(frame).await.is_err() {
                tracing::debug!(attribute = %request.attribute, "Channel gone before reply was sent");
            }
        });
    }

    async fn teardown(&mut self, mut tasks: JoinSet<()>) {
        self.state_tx.send_replace(ChannelState::Closed);
        tasks.shutdown().await;
        self.pending.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_core::CallArgs;
    use serde_json::json;

    struct Empty;

    impl Capability for Empty {
        fn name(&self) -> &str {
            "empty"
        }

        fn register(self: Arc<Self>, registry: &mut MemberRegistry) {
            registry.method("ping", |_args: CallArgs| Ok(json!("pong")));
        }
    }

    fn factory(_hooks: BridgeHooks) -> Arc<dyn Capability> {
        Arc::new(Empty)
    }

    #[test]
    fn test_new_registers_members() {
        let client = BridgeClient::new(BridgeConfig::new(5000), &factory).unwrap();
        assert!(client.registry().contains("ping"));
        assert_eq!(client.capability().name(), "empty");
        assert_eq!(client.hooks().channel_state(), ChannelState::Connecting);
    }

    #[test]
    fn test_new_rejects_missing_required_member() {
        let mut config = BridgeConfig::new(5000);
        config.required_members = vec!["ping".to_string(), "discoverReaders".to_string()];

        match BridgeClient::new(config, &factory) {
            Err(BridgeError::Capability(e)) => {
                assert!(e.to_string().contains("discoverReaders"));
            }
            Err(other) => panic!("Unexpected error: {}", other),
            Ok(_) => panic!("Expected validation failure"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_before_connect() {
        let client = BridgeClient::new(BridgeConfig::new(5000), &factory).unwrap();
        let hooks = client.hooks();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let end = client.run(shutdown).await.unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
        assert_eq!(hooks.channel_state(), ChannelState::Closed);
    }

    #[test]
    fn test_session_end_display() {
        let end = SessionEnd::Closed {
            code: Some(1000),
            reason: "bye".to_string(),
        };
        assert_eq!(end.to_string(), "closed by peer (1000): bye");
    }
}
