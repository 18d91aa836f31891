//! Gabin bridge - drive the Gabin auto camera director from a control panel

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gabin_bridge::bridge::GabinBridge;
use gabin_bridge::cli;
use gabin_bridge::config::BridgeConfig;

/// Gabin Bridge - control the Gabin auto camera director over OSC/UDP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Run without the interactive console
    #[arg(long)]
    headless: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting Gabin bridge...");
    info!("Configuration file: {}", args.config);

    let config = if tokio::fs::try_exists(&args.config).await.unwrap_or(false) {
        BridgeConfig::load(&args.config).await?
    } else {
        warn!("Config file '{}' not found, using defaults", args.config);
        BridgeConfig::default()
    };

    if args.check {
        info!(
            "Configuration OK: target {}:{}, feedback {}:{}",
            config.host, config.port, config.feedback_host, config.feedback_port
        );
        return Ok(());
    }

    let bridge = Arc::new(GabinBridge::new(config));

    bridge.subscribe_status(Arc::new(|state| {
        info!("Connection status: {}", state.label());
    }));

    if let Err(e) = bridge.connect().await {
        warn!("Initial connection failed: {e:#}");
        warn!("Use 'connect' in the console to retry");
    }

    if args.headless {
        shutdown_signal().await;
    } else {
        cli::run_repl(Arc::clone(&bridge)).await?;
    }

    bridge.shutdown();
    info!("Gabin bridge shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
