//! Quota Ledger inspection (§4.6/§10.5)

use crate::client::StratoClient;
use crate::error::CliResult;
use crate::output::{print_output, OutputFormat};
use clap::Subcommand;
use serde::Serialize;
use strato_types::{QuotaScope, ResourceQuota};
use tabled::Tabled;

#[derive(Subcommand)]
pub enum QuotaCommands {
    /// List every quota the ledger has live reservation counters for,
    /// merged over its persisted definitions
    List,
}

#[derive(Serialize, Tabled)]
struct QuotaRow {
    id: String,
    scope: String,
    environment: String,
    #[tabled(rename = "cpu reserved/max")]
    cpu: String,
    #[tabled(rename = "vms reserved/max")]
    vms: String,
    enabled: bool,
}

fn scope_label(scope: &QuotaScope) -> String {
    match scope {
        QuotaScope::Organization(id) => format!("organization:{id}"),
        QuotaScope::OrganizationalUnit(id) => format!("ou:{id}"),
        QuotaScope::Project(id) => format!("project:{id}"),
    }
}

impl From<&ResourceQuota> for QuotaRow {
    fn from(q: &ResourceQuota) -> Self {
        Self {
            id: q.id.to_string(),
            scope: scope_label(&q.scope),
            environment: q.environment.clone().unwrap_or_else(|| "-".to_string()),
            cpu: format!("{}/{}", q.reserved.resources.cpu, q.max.resources.cpu),
            vms: format!("{}/{}", q.reserved.vm_count, q.max.vm_count),
            enabled: q.enabled,
        }
    }
}

pub async fn execute(command: QuotaCommands, client: &StratoClient, format: OutputFormat) -> CliResult<()> {
    match command {
        QuotaCommands::List => {
            let quotas = client.list_quotas().await?;
            let rows: Vec<QuotaRow> = quotas.iter().map(QuotaRow::from).collect();
            print_output(rows, format);
            Ok(())
        }
    }
}
