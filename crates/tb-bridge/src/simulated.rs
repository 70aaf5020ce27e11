//! Simulated payment terminal
//!
//! Stands in for the vendor terminal SDK. It exposes the same member names
//! the backend drives (`discoverReaders`, `connectReader`, ...) and uses
//! the bridge hooks the way the real SDK does: a connection token is
//! fetched before the first reader connection and cached until the
//! credentials are cleared, and a dropped reader is reported to the
//! backend.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::{json, Value};

use tb_core::{CallArgs, Capability, InvocationError, MemberRegistry, MethodResult};
use tb_protocol::ErrorKind;

use crate::hooks::BridgeHooks;

/// Version string reported through the `sdkVersion` property
pub const SIMULATED_SDK_VERSION: &str = "simulated-1.0";

/// A reader as reported by discovery
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reader {
    pub id: String,
    pub label: String,
    pub serial_number: String,
    pub device_type: String,
    pub status: String,
}

impl Reader {
    fn simulated(index: usize) -> Self {
        Self {
            id: format!("tmr_simulated_{}", index),
            label: format!("Simulated reader {}", index),
            serial_number: format!("SIM-{:04}", index),
            device_type: "simulated_wisepos_e".to_string(),
            status: "online".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct TerminalState {
    connected: Option<Reader>,
    connection_token: Option<String>,
}

/// Capability object backed by simulated readers
pub struct SimulatedTerminal {
    hooks: BridgeHooks,
    state: Mutex<TerminalState>,
    readers: Vec<Reader>,
}

impl SimulatedTerminal {
    /// Create a terminal with two simulated readers
    pub fn new(hooks: BridgeHooks) -> Self {
        Self {
            hooks,
            state: Mutex::new(TerminalState::default()),
            readers: (1..=2).map(Reader::simulated).collect(),
        }
    }

    /// Factory for use with the supervisor
    pub fn factory(hooks: BridgeHooks) -> Arc<dyn Capability> {
        Arc::new(Self::new(hooks))
    }

    fn state(&self) -> MutexGuard<'_, TerminalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn discover_readers(&self, args: CallArgs) -> MethodResult {
        // The discovery config may come as kwargs or as a positional object
        let simulated = args
            .kwarg("simulated")
            .or_else(|| args.get(0).and_then(|config| config.get("simulated")))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let readers = if simulated {
            self.readers.clone()
        } else {
            Vec::new()
        };
        tracing::debug!(simulated, found = readers.len(), "Discovered readers");
        Ok(json!({ "discoveredReaders": readers }))
    }

    async fn connect_reader(&self, args: CallArgs) -> MethodResult {
        let requested = args
            .get(0)
            .or_else(|| args.kwarg("reader"))
            .and_then(|reader| reader.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| InvocationError::invalid_arguments("connectReader expects a reader"))?
            .to_string();

        let reader = self
            .readers
            .iter()
            .find(|reader| reader.id == requested)
            .cloned()
            .ok_or_else(|| {
                InvocationError::new(
                    ErrorKind::ReaderError,
                    format!("reader '{}' was not discovered", requested),
                )
            })?;

        self.ensure_disconnected()?;

        let cached = self.state().connection_token.clone();
        let token = match cached {
            Some(token) => token,
            None => self.hooks.fetch_connection_token().await.map_err(|e| {
                InvocationError::new(ErrorKind::FailedFetchConnectionToken, e.to_string())
            })?,
        };

        // Another connect may have finished while the token was in flight
        self.ensure_disconnected()?;
        {
            let mut state = self.state();
            state.connection_token = Some(token);
            state.connected = Some(reader.clone());
        }

        tracing::info!(reader = %reader.id, "Reader connected");
        Ok(json!({ "reader": reader }))
    }

    fn ensure_disconnected(&self) -> Result<(), InvocationError> {
        match &self.state().connected {
            Some(current) => Err(InvocationError::new(
                ErrorKind::AlreadyConnected,
                format!("already connected to reader '{}'", current.id),
            )),
            None => Ok(()),
        }
    }

    fn take_reader(&self) -> Result<Reader, InvocationError> {
        self.state().connected.take().ok_or_else(|| {
            InvocationError::new(
                ErrorKind::NoEstablishedConnection,
                "no reader is connected",
            )
        })
    }

    async fn disconnect_reader(&self, _args: CallArgs) -> MethodResult {
        let reader = self.take_reader()?;
        tracing::info!(reader = %reader.id, "Reader disconnected");
        Ok(json!({}))
    }

    async fn simulate_reader_disconnect(&self, _args: CallArgs) -> MethodResult {
        let reader = self.take_reader()?;
        tracing::info!(reader = %reader.id, "Simulating unexpected reader disconnect");

        let acknowledgement = self
            .hooks
            .on_unexpected_reader_disconnect()
            .await
            .map_err(|e| InvocationError::new(ErrorKind::Error, e.to_string()))?;
        Ok(json!({ "acknowledged": acknowledgement }))
    }

    fn connection_status(&self) -> &'static str {
        if self.state().connected.is_some() {
            "connected"
        } else {
            "not_connected"
        }
    }

    fn payment_status(&self) -> &'static str {
        if self.state().connected.is_some() {
            "ready"
        } else {
            "not_ready"
        }
    }

    fn clear_cached_credentials(&self) -> Value {
        self.state().connection_token = None;
        json!({})
    }
}

impl Capability for SimulatedTerminal {
    fn name(&self) -> &str {
        "simulated-terminal"
    }

    fn register(self: Arc<Self>, registry: &mut MemberRegistry) {
        let this = Arc::clone(&self);
        registry.async_method("discoverReaders", move |args| {
            let this = Arc::clone(&this);
            async move { this.discover_readers(args).await }
        });

        let this = Arc::clone(&self);
        registry.async_method("connectReader", move |args| {
            let this = Arc::clone(&this);
            async move { this.connect_reader(args).await }
        });

        let this = Arc::clone(&self);
        registry.async_method("disconnectReader", move |args| {
            let this = Arc::clone(&this);
            async move { this.disconnect_reader(args).await }
        });

        let this = Arc::clone(&self);
        registry.async_method("simulateReaderDisconnect", move |args| {
            let this = Arc::clone(&this);
            async move { this.simulate_reader_disconnect(args).await }
        });

        let this = Arc::clone(&self);
        registry.method("getConnectionStatus", move |_args| {
            Ok(json!(this.connection_status()))
        });

        let this = Arc::clone(&self);
        registry.method("getPaymentStatus", move |_args| {
            Ok(json!(this.payment_status()))
        });

        let this = Arc::clone(&self);
        registry.method("clearCachedCredentials", move |_args| {
            Ok(this.clear_cached_credentials())
        });

        registry.property("sdkVersion", || json!(SIMULATED_SDK_VERSION));
    }
}
