//! Bridge client configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::error::ConfigError;

/// Default WebSocket port of the control backend
pub const DEFAULT_PORT: u16 = 5000;

/// Configuration for the bridge client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Backend host
    pub host: String,

    /// Backend WebSocket port
    pub port: u16,

    /// Members the capability object must expose; checked at startup
    pub required_members: Vec<String>,

    /// Capacity of the outbound frame queue
    pub outbound_capacity: usize,

    /// Restart policy applied when the channel closes or fails
    pub restart: RestartConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            required_members: vec![],
            outbound_capacity: 256,
            restart: RestartConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Create a configuration targeting the given port on the loopback host
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Set the backend host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// `host:port` of the backend
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// WebSocket URL of the backend
    pub fn url(&self) -> String {
        format!("ws://{}", self.address())
    }

    /// Check values that would make every connection attempt fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".to_string()));
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbound_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fixed-delay restart configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Delay between a channel failure and the next client start
    #[serde(rename = "delay_ms", with = "duration_millis")]
    pub delay: Duration,

    /// Consecutive failed starts tolerated before giving up (unbounded when unset)
    pub max_restarts: Option<u32>,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000),
            max_restarts: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets_loopback() {
        let config = BridgeConfig::default();
        assert_eq!(config.url(), "ws://localhost:5000");
    }

    #[test]
    fn test_custom_host() {
        let config = BridgeConfig::new(8765).with_host("127.0.0.1");
        assert_eq!(config.address(), "127.0.0.1:8765");
        assert_eq!(config.url(), "ws://127.0.0.1:8765");
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = BridgeConfig::new(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let config = BridgeConfig::new(5000).with_host(" ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(BridgeConfig::default().validate().is_ok());
    }
}
