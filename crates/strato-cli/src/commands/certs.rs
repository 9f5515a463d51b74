//! Forced certificate revocation (§4.1/§10.5): an operator action outside
//! the normal rotation/expiry flow, for a compromised or decommissioned
//! agent.

use crate::client::StratoClient;
use crate::error::CliResult;
use crate::output::print_success;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum CertCommands {
    /// Force-revoke a certificate by serial (hex, as shown by `strato agents get`).
    Revoke {
        /// Certificate serial, hex-encoded
        serial: String,

        /// Reason recorded on the revocation
        #[arg(long, default_value = "operator-initiated revocation")]
        reason: String,
    },
}

pub async fn execute(command: CertCommands, client: &StratoClient) -> CliResult<()> {
    match command {
        CertCommands::Revoke { serial, reason } => {
            client.revoke_certificate(&serial, &reason).await?;
            print_success(&format!("revoked certificate {serial}"));
            Ok(())
        }
    }
}
