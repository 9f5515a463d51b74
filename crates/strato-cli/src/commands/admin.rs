//! First-run bootstrap

use crate::client::StratoClient;
use crate::error::CliResult;
use crate::output::print_success;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Create the first system-admin user and print its API key. Single-use:
    /// fails once any user already exists.
    Bootstrap,
}

pub async fn execute(command: AdminCommands, client: &StratoClient) -> CliResult<()> {
    match command {
        AdminCommands::Bootstrap => {
            let result = client.bootstrap().await?;
            print_success(&format!("created admin user {}", result.user.id));
            println!("API key (store this now, it is never shown again):");
            println!("  {}", result.api_key);
            Ok(())
        }
    }
}
