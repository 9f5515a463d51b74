//! strato - operator CLI for stratod
//!
//! Covers the admin actions that don't belong on the tenant-facing HTTP
//! surface: first-run bootstrap, join-token minting, forced certificate
//! revocation, and read-only registry/ledger inspection.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod commands;
mod config;
mod error;
mod output;

use client::StratoClient;
use commands::{admin, agents, certs, enroll, quotas};
use config::CliConfig;
use error::CliResult;

/// strato CLI application
#[derive(Parser)]
#[command(name = "strato")]
#[command(about = "Strato control-plane operator CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "STRATO_CLI_CONFIG")]
    config: Option<String>,

    /// stratod endpoint
    #[arg(short, long, env = "STRATO_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    /// Admin API key (`sk_…`)
    #[arg(long, env = "STRATO_API_KEY")]
    api_key: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// First-run bootstrap
    Admin {
        #[command(subcommand)]
        command: admin::AdminCommands,
    },

    /// Join-token minting
    Enroll {
        #[command(subcommand)]
        command: enroll::EnrollCommands,
    },

    /// Forced certificate revocation
    Cert {
        #[command(subcommand)]
        command: certs::CertCommands,
    },

    /// Agent Registry inspection
    Agents {
        #[command(subcommand)]
        command: agents::AgentCommands,
    },

    /// Quota Ledger inspection
    Quotas {
        #[command(subcommand)]
        command: quotas::QuotaCommands,
    },

    /// Check daemon connectivity
    Status,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let config = CliConfig::load(cli.config.as_deref())?;
    let endpoint = cli.endpoint.clone();
    let api_key = cli.api_key.or(config.api_key.clone());

    let client = StratoClient::new(&endpoint, api_key)?;

    match cli.command {
        Commands::Admin { command } => admin::execute(command, &client).await,
        Commands::Enroll { command } => enroll::execute(command, &client).await,
        Commands::Cert { command } => certs::execute(command, &client).await,
        Commands::Agents { command } => agents::execute(command, &client, cli.output).await,
        Commands::Quotas { command } => quotas::execute(command, &client, cli.output).await,
        Commands::Status => match client.health_check().await {
            Ok(status) => {
                println!("✓ stratod is {}", status.status);
                println!("  Version: {}", status.version);
                println!("  Uptime: {}", status.uptime);
                Ok(())
            }
            Err(e) => {
                eprintln!("✗ cannot reach stratod: {}", e);
                std::process::exit(1);
            }
        },
    }
}
