//! Join-token minting (§4.2/§10.5)

use crate::client::StratoClient;
use crate::error::CliResult;
use crate::output::print_success;
use clap::Subcommand;
use strato_types::AgentId;

#[derive(Subcommand)]
pub enum EnrollCommands {
    /// Mint a join token an agent redeems against a CSR to enroll.
    MintToken {
        /// Agent id the token is bound to
        agent_id: AgentId,

        /// Token lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
    },
}

pub async fn execute(command: EnrollCommands, client: &StratoClient) -> CliResult<()> {
    match command {
        EnrollCommands::MintToken { agent_id, ttl_secs } => {
            let result = client.mint_join_token(agent_id, ttl_secs).await?;
            print_success(&format!("minted join token for {agent_id}, expires {}", result.expires_at));
            println!("{}", result.token);
            Ok(())
        }
    }
}
