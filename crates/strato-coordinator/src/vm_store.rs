//! Persistence seam for the VM table. The coordinator only ever needs
//! whole-row reads and writes; cross-entity joins belong to the daemon's
//! HTTP layer, not here.

use async_trait::async_trait;
use strato_types::{AgentId, AuditEntry, ProjectId, Reservation, StratoResult, Vm, VmId};

#[async_trait]
pub trait VmStore: Send + Sync {
    /// Writes the VM row together with the reservation it holds against the
    /// Quota Ledger and an audit entry of the creation, in a single
    /// transaction, committed before any outbound agent command (§5).
    async fn insert(&self, vm: &Vm, reservation: &Reservation, audit: &AuditEntry) -> StratoResult<()>;

    async fn update(&self, vm: &Vm) -> StratoResult<()>;
    async fn get(&self, vm_id: VmId) -> StratoResult<Vm>;

    /// Flips a reservation's `committed` flag — a single-table, row-level
    /// update (§5), called once the VM durably reaches `running`.
    async fn mark_reservation_committed(&self, vm_id: VmId) -> StratoResult<()>;

    /// VMs assigned to `agent_id` whose state still holds a reservation
    /// (`scheduled`, `starting`, `running`, `stopping`) — used to rebuild
    /// Registry reservations on control-plane restart.
    async fn list_reserved_by_agent(&self, agent_id: AgentId) -> StratoResult<Vec<Vm>>;

    async fn list_all_reserved(&self) -> StratoResult<Vec<Vm>>;

    /// Reservation rows backing VMs still in a reservation-holding state —
    /// the source of truth Ledger reconciliation rebuilds from, independent
    /// of the VM's own `spec.requested` (§4.4, §5).
    async fn list_open_reservations(&self) -> StratoResult<Vec<Reservation>>;

    async fn list_vms_by_project(&self, project_id: ProjectId) -> StratoResult<Vec<Vm>>;
}
