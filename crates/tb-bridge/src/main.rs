//! Terminal bridge daemon
//!
//! Connects to the control backend and serves the simulated payment
//! terminal over the bridge protocol, restarting the client whenever the
//! channel drops.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tb_bridge::{BridgeContext, SimulatedTerminal};
use tb_core::config::{self, BridgeConfig};

#[derive(Parser)]
#[command(name = "tb-bridge")]
#[command(about = "Terminal bridge - relays backend requests to a payment terminal")]
#[command(version)]
struct Args {
    /// Backend WebSocket port
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend host
    #[arg(long)]
    host: Option<String>,

    /// Delay before restarting after the channel drops, in milliseconds
    #[arg(long)]
    restart_delay_ms: Option<u64>,

    /// Consecutive failed restarts tolerated before exiting
    #[arg(long)]
    max_restarts: Option<u32>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // All bridge work is cooperative on one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    tracing::info!("Terminal bridge starting...");

    let config = load_config(&args)?;
    config.validate().context("Invalid configuration")?;

    tracing::info!("Backend: {}", config.url());
    if !config.required_members.is_empty() {
        tracing::info!("Required members: {}", config.required_members.join(", "));
    }

    let mut context = BridgeContext::new(config);
    context.start(SimulatedTerminal::factory);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown requested");
            context.stop().await.context("Bridge failed during shutdown")?;
        }
        result = context.wait() => {
            result.context("Bridge stopped")?;
        }
    }

    tracing::info!("Terminal bridge stopped");
    Ok(())
}

/// Load the config file, then apply command-line overrides
fn load_config(args: &Args) -> Result<BridgeConfig> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        if args.config.is_some() {
            anyhow::bail!("Config file not found: {:?}", config_path);
        }
        tracing::debug!("No config at {:?}, using defaults", config_path);
        BridgeConfig::default()
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(delay) = args.restart_delay_ms {
        config.restart.delay = Duration::from_millis(delay);
    }
    if let Some(max) = args.max_restarts {
        config.restart.max_restarts = Some(max);
    }

    Ok(config)
}
