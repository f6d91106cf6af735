//! Binary entry point for the webhook bridge service.
//!
//! Loads configuration from an optional file plus environment overrides,
//! initializes logging, and runs the orchestrator until a shutdown signal.

use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webhook_bridge_service::orchestrator::{self, ServiceError};
use webhook_bridge_service::BridgeConfig;

#[derive(Debug, Parser)]
#[command(name = "webhook-bridge", version, about = "Webhook to plugin-executor dispatch service")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "WEBHOOK_BRIDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match BridgeConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(3);
        }
    };

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        executor = %format!("{}:{}", config.executor.host, config.executor.port),
        "Starting webhook bridge"
    );
    if config.executor.auto_start {
        warn!("executor.auto_start is set; executor lifecycle is managed by deployment tooling, ignoring");
    }

    if let Err(e) = orchestrator::run(config).await {
        tracing::error!(error = %e, "Service failed");
        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
            ServiceError::StorageUnavailable { .. } => 4,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

fn init_logging(config: &BridgeConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "webhook_bridge_service={level},webhook_bridge_core={level},pool_runtime={level},executor_sdk={level},tower_http=info",
            level = config.logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
