//! Agent Registry inspection (§4.3/§10.5)

use crate::client::StratoClient;
use crate::error::CliResult;
use crate::output::{print_output, print_single, OutputFormat};
use clap::Subcommand;
use serde::Serialize;
use strato_types::{Agent, AgentId};
use tabled::Tabled;

#[derive(Subcommand)]
pub enum AgentCommands {
    /// List every agent the registry knows about
    List,

    /// Show a single agent's full record
    Get {
        /// Agent id
        agent_id: AgentId,
    },
}

#[derive(Serialize, Tabled)]
struct AgentRow {
    id: String,
    name: String,
    status: String,
    #[tabled(rename = "cpu avail/total")]
    cpu: String,
    #[tabled(rename = "running vms")]
    running_vm_count: u32,
}

impl From<&Agent> for AgentRow {
    fn from(a: &Agent) -> Self {
        Self {
            id: a.id.to_string(),
            name: a.name.clone(),
            status: format!("{:?}", a.status),
            cpu: format!("{}/{}", a.available.cpu, a.total.cpu),
            running_vm_count: a.running_vm_count,
        }
    }
}

pub async fn execute(command: AgentCommands, client: &StratoClient, format: OutputFormat) -> CliResult<()> {
    match command {
        AgentCommands::List => {
            let agents = client.list_agents().await?;
            let rows: Vec<AgentRow> = agents.iter().map(AgentRow::from).collect();
            print_output(rows, format);
            Ok(())
        }
        AgentCommands::Get { agent_id } => {
            let agent = client.get_agent(agent_id).await?;
            print_single(&agent, format);
            Ok(())
        }
    }
}
