//! Application context for the bridge

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tb_core::config::BridgeConfig;
use tb_core::BridgeError;

use crate::client::CapabilityFactory;
use crate::supervisor::Supervisor;

/// Owns the bridge configuration and the lifecycle of its supervisor
pub struct BridgeContext {
    /// Configuration
    pub config: BridgeConfig,
    /// Cancelled by `stop`
    shutdown: CancellationToken,
    /// Running supervisor, if started
    handle: Option<JoinHandle<Result<(), BridgeError>>>,
}

impl BridgeContext {
    /// Create a new, stopped context
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            handle: None,
        }
    }

    /// Whether a supervisor is running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Start the supervisor in the background. Does nothing if it is
    /// already running.
    pub fn start<F: CapabilityFactory>(&mut self, factory: F) {
        if self.is_running() {
            tracing::warn!("Bridge already running");
            return;
        }

        self.shutdown = CancellationToken::new();
        let supervisor = Supervisor::new(self.config.clone(), Arc::new(factory));
        let shutdown = self.shutdown.clone();

        tracing::info!("Starting bridge to {}", self.config.address());
        self.handle = Some(tokio::spawn(async move { supervisor.run(shutdown).await }));
    }

    /// Wait for the supervisor to finish on its own
    pub async fn wait(&mut self) -> Result<(), BridgeError> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(());
        };
        let result = handle.await;
        self.handle = None;

        match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Supervisor task failed: {}", e);
                Err(BridgeError::TaskFailed(e.to_string()))
            }
        }
    }

    /// Request shutdown and wait for the supervisor to finish
    pub async fn stop(&mut self) -> Result<(), BridgeError> {
        self.shutdown.cancel();
        self.wait().await
    }
}
