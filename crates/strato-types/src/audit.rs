//! Persisted records for the two tables a VM creation writes alongside its
//! own row: the reservation it holds against the Quota Ledger, and an audit
//! entry of the mutation itself (§5, §10.4).

use crate::ids::{ProjectId, ReservationId, VmId};
use crate::resources::Resources;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A durable record of a Quota Ledger reservation, written in the same
/// transaction as the VM row it backs. `committed` mirrors the Ledger's own
/// reserve/commit state so reconciliation can rebuild Ledger counters from
/// this table alone rather than re-deriving them from the VM's spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub vm_id: VmId,
    pub project_id: ProjectId,
    pub environment: String,
    pub amount: Resources,
    pub committed: bool,
    pub created_at: DateTime<Utc>,
}

/// A single cross-entity mutation record: who did what to which VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: String,
    pub vm_id: VmId,
    pub project_id: ProjectId,
    pub details: Value,
    pub recorded_at: DateTime<Utc>,
}
