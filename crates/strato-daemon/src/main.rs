//! stratod - Strato control-plane daemon
//!
//! Serves the REST hierarchy/quota/VM API, the agent enrollment endpoints,
//! and the WebSocket-framed Agent Channel from one process, backed by an
//! in-memory or PostgreSQL storage layer.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod server;
mod storage;

use config::DaemonConfig;
use error::DaemonResult;
use server::Server;

/// Strato control-plane daemon CLI
#[derive(Parser)]
#[command(name = "stratod")]
#[command(about = "Strato control-plane daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "STRATO_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "STRATO_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "STRATO_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "STRATO_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = DaemonConfig::load(cli.config.as_deref()).map_err(|e| error::DaemonError::Config(e.to_string()))?;

    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| error::DaemonError::Config(format!("invalid listen address: {e}")))?;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        "starting stratod"
    );

    let server = Server::new(config).await?;
    let result = server.run().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, exit_code = e.exit_code(), "stratod exiting");
        std::process::exit(e.exit_code());
    }
    result
}
