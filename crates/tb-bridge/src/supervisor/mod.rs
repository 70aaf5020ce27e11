//! Supervised restarts of the bridge client
//!
//! When a session ends for any reason other than shutdown, the whole client
//! is discarded and a new one is built after a fixed delay. Nothing carries
//! over between clients: channel, capability object and pending table are
//! all recreated.

mod restart;

pub use restart::RestartPolicy;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tb_core::config::BridgeConfig;
use tb_core::BridgeError;

use crate::client::{BridgeClient, CapabilityFactory, SessionEnd};

/// Runs bridge clients back to back under a restart policy
pub struct Supervisor {
    config: BridgeConfig,
    factory: Arc<dyn CapabilityFactory>,
}

impl Supervisor {
    /// Create a new supervisor
    pub fn new(config: BridgeConfig, factory: Arc<dyn CapabilityFactory>) -> Self {
        Self { config, factory }
    }

    /// Get the bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run until `shutdown` fires or the policy gives up.
    ///
    /// Configuration and capability validation errors are returned
    /// immediately; they would fail the same way on every restart.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), BridgeError> {
        self.config.validate()?;
        let mut policy = RestartPolicy::from_config(&self.config.restart);
        let mut generation: u64 = 0;

        loop {
            generation += 1;
            let client = BridgeClient::new(self.config.clone(), self.factory.as_ref())?;
            tracing::debug!(generation, "Starting bridge client");

            let (established, cause) = match client.run(shutdown.clone()).await {
                Ok(SessionEnd::Shutdown) => {
                    tracing::info!(generation, "Bridge stopped");
                    return Ok(());
                }
                Ok(end) => (true, end.to_string()),
                Err(e) => (false, e.to_string()),
            };

            let Some(delay) = policy.next_delay(established) else {
                tracing::error!(
                    generation,
                    failures = policy.failures(),
                    cause = %cause,
                    "Giving up on backend at {}",
                    self.config.address()
                );
                return Err(BridgeError::RestartLimitExceeded {
                    attempts: policy.failures(),
                });
            };

            tracing::warn!(
                generation,
                failures = policy.failures(),
                cause = %cause,
                "Bridge client stopped. Restarting in {:?}",
                delay
            );

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(generation, "Bridge stopped during restart delay");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
