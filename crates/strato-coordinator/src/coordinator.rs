//! The VM Lifecycle Coordinator (§4.8): sole owner of cross-cutting
//! contracts for VM operations. A facade struct composing the Registry,
//! the Authorization Oracle, the Quota Ledger, the Scheduler, and the
//! Agent Channel map — the same service-struct-over-trait-objects shape
//! used throughout this codebase's orchestration layer.

use crate::context::ProjectContext;
use crate::error::Result;
use crate::vm_store::VmStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use strato_channel::{ChannelMap, CommandPayload, ReplyStatus};
use strato_ledger::{QuotaLedger, ReservationHandle};
use strato_oracle::{Permission, PermissionOracle};
use strato_registry::AgentRegistry;
use strato_scheduler::Scheduler;
use strato_types::{
    AgentId, AuditEntry, ProjectId, Reservation, ReservationId, SchedulingStrategyKind, StratoError, UserId, Vm,
    VmId, VmSpec, VmState,
};
use uuid::Uuid;

/// Bounded retries on scheduling contention before surfacing
/// `SchedulingContention` (§4.7/§4.8).
const MAX_SCHEDULING_RETRIES: usize = 3;

pub struct CreateVmRequest {
    pub name: String,
    pub owner: UserId,
    pub environment: String,
    pub spec: VmSpec,
    pub scheduling_strategy: Option<SchedulingStrategyKind>,
}

pub struct Coordinator {
    registry: Arc<dyn AgentRegistry>,
    oracle: Arc<dyn PermissionOracle>,
    ledger: Arc<QuotaLedger>,
    scheduler: Arc<Scheduler>,
    channels: Arc<ChannelMap>,
    vms: Arc<dyn VmStore>,
    command_timeout: std::time::Duration,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn AgentRegistry>,
        oracle: Arc<dyn PermissionOracle>,
        ledger: Arc<QuotaLedger>,
        scheduler: Arc<Scheduler>,
        channels: Arc<ChannelMap>,
        vms: Arc<dyn VmStore>,
        command_timeout: std::time::Duration,
    ) -> Self {
        Self {
            registry,
            oracle,
            ledger,
            scheduler,
            channels,
            vms,
            command_timeout,
        }
    }

    async fn check(&self, subject: &str, permission: Permission, resource: &str) -> Result<()> {
        let result = self.oracle.check(subject, permission, resource).await?;
        if !result.allowed {
            return Err(StratoError::PermissionDenied);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, ctx, req), fields(project_id = %ctx.project_id))]
    pub async fn create_vm(&self, caller: &str, ctx: &ProjectContext, req: CreateVmRequest) -> Result<Vm> {
        self.check(caller, Permission::CreateResources, &ctx.project_id.to_string()).await?;

        if !ctx.environments.contains(&req.environment) {
            return Err(StratoError::BadRequest(format!(
                "environment {:?} is not declared on project {}",
                req.environment, ctx.project_id
            )));
        }

        let chain = ctx.ledger_chain(&req.environment);
        let handle = self.ledger.reserve(&chain, req.spec.requested).await?;

        let agent_id = match self.select_with_retry(&req.spec, req.scheduling_strategy).await {
            Ok(id) => id,
            Err(e) => {
                self.ledger.release(handle).await.ok();
                return Err(e);
            }
        };

        let now = Utc::now();
        let mut vm = Vm {
            id: VmId::new(),
            name: req.name,
            owner: req.owner,
            project_id: ctx.project_id,
            environment: req.environment,
            spec: req.spec,
            assigned_agent: Some(agent_id),
            state: VmState::Scheduled,
            reservation: Some(ReservationId::from_uuid(handle.0)),
            created_at: now,
            updated_at: now,
        };
        let reservation = Reservation {
            id: ReservationId::from_uuid(handle.0),
            vm_id: vm.id,
            project_id: ctx.project_id,
            environment: vm.environment.clone(),
            amount: vm.spec.requested,
            committed: false,
            created_at: now,
        };
        let audit = AuditEntry {
            actor: caller.to_string(),
            action: "create_vm".to_string(),
            vm_id: vm.id,
            project_id: ctx.project_id,
            details: serde_json::json!({ "name": vm.name, "environment": vm.environment }),
            recorded_at: now,
        };
        self.vms.insert(&vm, &reservation, &audit).await?;

        let Some(channel) = self.channels.get(agent_id) else {
            self.compensate(agent_id, handle, vm.spec.requested).await;
            vm.transition(VmState::Failed, Utc::now())?;
            self.vms.update(&vm).await?;
            return Err(StratoError::AgentDisconnected);
        };

        let payload = CommandPayload {
            op: "create_vm".to_string(),
            vm: serde_json::json!({
                "vm_id": vm.id.to_string(),
                "name": vm.name,
                "environment": vm.environment,
                "spec": vm.spec,
            }),
        };

        match channel.send_request(payload, Some(self.command_timeout)).await {
            Ok(reply) if reply.status == ReplyStatus::Ok => {
                vm.transition(VmState::Starting, Utc::now())?;
                self.vms.update(&vm).await?;
                Ok(vm)
            }
            other => {
                let classified = match other {
                    Ok(reply) => StratoError::BadRequest(
                        reply
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "agent rejected create_vm".to_string()),
                    ),
                    Err(e) => e.into(),
                };
                self.compensate(agent_id, handle, vm.spec.requested).await;
                vm.transition(VmState::Failed, Utc::now())?;
                self.vms.update(&vm).await?;
                Err(classified)
            }
        }
    }

    async fn select_with_retry(&self, spec: &VmSpec, strategy: Option<SchedulingStrategyKind>) -> Result<AgentId> {
        for attempt in 0..MAX_SCHEDULING_RETRIES {
            let snapshot = self.registry.snapshot().await;
            let agent_id = self.scheduler.select_agent(spec, &snapshot, strategy)?;
            match self.registry.reserve(agent_id, spec.requested).await {
                Ok(()) => return Ok(agent_id),
                Err(_) => {
                    tracing::warn!(attempt, "registry reservation contention, retrying with a fresh snapshot");
                    continue;
                }
            }
        }
        Err(StratoError::SchedulingContention)
    }

    /// Undo, in reverse acquisition order: unreserve the Registry hold,
    /// then release the Ledger reservation. An explicit, linear sequence
    /// rather than a generic rollback engine, per this codebase's
    /// preference for concrete execution paths.
    async fn compensate(&self, agent_id: AgentId, handle: ReservationHandle, delta: strato_types::Resources) {
        if let Err(e) = self.registry.unreserve(agent_id, delta).await {
            tracing::warn!(agent_id = %agent_id, error = %e, "compensating unreserve failed");
        }
        if let Err(e) = self.ledger.release(handle).await {
            tracing::warn!(error = %e, "compensating ledger release failed");
        }
    }

    async fn control_op(&self, caller: &str, vm_id: VmId, permission: Permission, op: &str, target: VmState) -> Result<Vm> {
        let mut vm = self.vms.get(vm_id).await?;
        self.check(caller, permission, &vm.id.to_string()).await?;

        if !vm.state.can_transition_to(target) {
            return Err(StratoError::InvalidStateTransition {
                from: format!("{:?}", vm.state),
                to: format!("{target:?}"),
            });
        }

        let Some(agent_id) = vm.assigned_agent else {
            return Err(StratoError::AgentDisconnected);
        };
        let Some(channel) = self.channels.get(agent_id) else {
            return Err(StratoError::AgentDisconnected);
        };

        let payload = CommandPayload {
            op: op.to_string(),
            vm: serde_json::json!({ "vm_id": vm.id.to_string() }),
        };
        let reply = channel.send_request(payload, Some(self.command_timeout)).await?;
        if reply.status != ReplyStatus::Ok {
            return Err(StratoError::BadRequest(
                reply.error.map(|e| e.message).unwrap_or_else(|| format!("agent rejected {op}")),
            ));
        }

        vm.transition(target, Utc::now())?;
        self.vms.update(&vm).await?;
        Ok(vm)
    }

    pub async fn start_vm(&self, caller: &str, vm_id: VmId) -> Result<Vm> {
        self.control_op(caller, vm_id, Permission::Start, "start", VmState::Starting).await
    }

    pub async fn stop_vm(&self, caller: &str, vm_id: VmId) -> Result<Vm> {
        self.control_op(caller, vm_id, Permission::Stop, "stop", VmState::Stopping).await
    }

    pub async fn pause_vm(&self, caller: &str, vm_id: VmId) -> Result<Vm> {
        self.control_op(caller, vm_id, Permission::Pause, "pause", VmState::Stopping).await
    }

    pub async fn resume_vm(&self, caller: &str, vm_id: VmId) -> Result<Vm> {
        self.control_op(caller, vm_id, Permission::Resume, "resume", VmState::Running).await
    }

    /// A single `restart` round trip rather than a `stop` followed by a
    /// `start`: composing the two would leave the VM parked in `Stopping`
    /// with no legal transition back to `Starting` (§4.8).
    pub async fn restart_vm(&self, caller: &str, vm_id: VmId) -> Result<Vm> {
        self.control_op(caller, vm_id, Permission::Restart, "restart", VmState::Starting)
            .await
    }

    /// Processes a terminal delivery from the agent's own event stream
    /// (`vm_running`, `vm_stopped`, `vm_failed`); commits the Ledger
    /// reservation once a VM is durably `running` (the default
    /// commit-on-running policy, §4.8).
    pub async fn handle_lifecycle_event(&self, vm_id: VmId, kind: &str) -> Result<Vm> {
        let mut vm = self.vms.get(vm_id).await?;
        let target = match kind {
            "vm_running" => VmState::Running,
            "vm_stopped" => VmState::Stopped,
            "vm_failed" => VmState::Failed,
            other => {
                return Err(StratoError::BadRequest(format!("unrecognized lifecycle event kind {other:?}")));
            }
        };
        vm.transition(target, Utc::now())?;

        if target == VmState::Running {
            if let Some(reservation) = vm.reservation {
                let handle = ReservationHandle(reservation.as_uuid());
                if let Err(e) = self.ledger.commit(handle).await {
                    tracing::warn!(vm_id = %vm_id, error = %e, "failed to commit ledger reservation on running transition");
                }
                if let Err(e) = self.vms.mark_reservation_committed(vm_id).await {
                    tracing::warn!(vm_id = %vm_id, error = %e, "failed to persist reservation commit");
                }
            }
        }

        self.vms.update(&vm).await?;
        Ok(vm)
    }

    pub async fn delete_vm(&self, caller: &str, vm_id: VmId) -> Result<()> {
        let mut vm = self.vms.get(vm_id).await?;
        self.check(caller, Permission::Delete, &vm.id.to_string()).await?;

        if let Some(agent_id) = vm.assigned_agent {
            if let Some(channel) = self.channels.get(agent_id) {
                let payload = CommandPayload {
                    op: "delete".to_string(),
                    vm: serde_json::json!({ "vm_id": vm.id.to_string() }),
                };
                let _ = channel.send_request(payload, Some(self.command_timeout)).await;
                self.registry.unreserve(agent_id, vm.spec.requested).await.ok();
            }
        }

        if let Some(reservation) = vm.reservation.take() {
            if vm.state.holds_reservation() {
                self.ledger.release(ReservationHandle(reservation.as_uuid())).await.ok();
            }
        }

        vm.transition(VmState::Deleted, Utc::now())?;
        self.vms.update(&vm).await?;
        Ok(())
    }

    /// Rebuilds Registry reservations and Ledger reservation handles from
    /// the persisted VM table on control-plane restart (§4.8). `contexts`
    /// supplies the scope chain per project since the Coordinator does not
    /// own hierarchy storage. Best-effort: a single VM's reconciliation
    /// failure is logged and does not abort the rest.
    pub async fn reconcile(&self, contexts: &HashMap<ProjectId, ProjectContext>) -> usize {
        let vms = match self.vms.list_all_reserved().await {
            Ok(vms) => vms,
            Err(e) => {
                tracing::error!(error = %e, "failed to load persisted VM table for reconciliation");
                return 0;
            }
        };

        let reservations = match self.vms.list_open_reservations().await {
            Ok(reservations) => reservations,
            Err(e) => {
                tracing::error!(error = %e, "failed to load persisted reservation table for reconciliation");
                return 0;
            }
        };
        let by_vm: HashMap<VmId, Reservation> = reservations.into_iter().map(|r| (r.vm_id, r)).collect();

        let mut reconciled = 0;
        for mut vm in vms {
            let Some(agent_id) = vm.assigned_agent else {
                continue;
            };
            if let Err(e) = self.registry.reserve(agent_id, vm.spec.requested).await {
                tracing::warn!(vm_id = %vm.id, agent_id = %agent_id, error = %e, "reconciliation: registry reserve failed");
                continue;
            }

            let Some(ctx) = contexts.get(&vm.project_id) else {
                tracing::warn!(vm_id = %vm.id, "reconciliation: no project context supplied, skipping ledger rebuild");
                continue;
            };
            let Some(reservation) = by_vm.get(&vm.id) else {
                tracing::warn!(vm_id = %vm.id, "reconciliation: no persisted reservation row, skipping ledger rebuild");
                continue;
            };
            let chain = ctx.ledger_chain(&reservation.environment);
            match self.ledger.reserve(&chain, reservation.amount).await {
                Ok(handle) => {
                    vm.reservation = Some(ReservationId::from_uuid(handle.0));
                    if vm.state == VmState::Running {
                        self.ledger.commit(handle).await.ok();
                    }
                    if let Err(e) = self.vms.update(&vm).await {
                        tracing::warn!(vm_id = %vm.id, error = %e, "reconciliation: failed to persist rebuilt reservation handle");
                    }
                    reconciled += 1;
                }
                Err(e) => {
                    tracing::warn!(vm_id = %vm.id, error = %e, "reconciliation: ledger reserve failed");
                }
            }
        }
        reconciled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dashmap::DashMap;
    use std::collections::BTreeSet;
    use strato_channel::{ack_reply, error_reply, WireMessage};
    use strato_ledger::QuotaLedger;
    use strato_oracle::AllowAllOracle;
    use strato_registry::{InMemoryAgentRegistry, RegisterRequest};
    use strato_scheduler::Scheduler;
    use strato_types::{CertificateSerial, Resources, SchedulingStrategyKind};

    #[derive(Default)]
    struct FakeVmStore {
        vms: DashMap<VmId, Vm>,
        reservations: DashMap<VmId, strato_types::Reservation>,
    }

    #[async_trait]
    impl VmStore for FakeVmStore {
        async fn insert(
            &self,
            vm: &Vm,
            reservation: &strato_types::Reservation,
            _audit: &strato_types::AuditEntry,
        ) -> strato_types::StratoResult<()> {
            self.vms.insert(vm.id, vm.clone());
            self.reservations.insert(vm.id, reservation.clone());
            Ok(())
        }

        async fn update(&self, vm: &Vm) -> strato_types::StratoResult<()> {
            self.vms.insert(vm.id, vm.clone());
            Ok(())
        }

        async fn get(&self, vm_id: VmId) -> strato_types::StratoResult<Vm> {
            self.vms
                .get(&vm_id)
                .map(|e| e.value().clone())
                .ok_or_else(|| StratoError::NotFound(vm_id.to_string()))
        }

        async fn mark_reservation_committed(&self, vm_id: VmId) -> strato_types::StratoResult<()> {
            if let Some(mut reservation) = self.reservations.get_mut(&vm_id) {
                reservation.committed = true;
            }
            Ok(())
        }

        async fn list_reserved_by_agent(&self, agent_id: AgentId) -> strato_types::StratoResult<Vec<Vm>> {
            Ok(self
                .vms
                .iter()
                .filter(|e| e.value().assigned_agent == Some(agent_id) && e.value().state.holds_reservation())
                .map(|e| e.value().clone())
                .collect())
        }

        async fn list_all_reserved(&self) -> strato_types::StratoResult<Vec<Vm>> {
            Ok(self
                .vms
                .iter()
                .filter(|e| e.value().state.holds_reservation())
                .map(|e| e.value().clone())
                .collect())
        }

        async fn list_open_reservations(&self) -> strato_types::StratoResult<Vec<strato_types::Reservation>> {
            Ok(self
                .vms
                .iter()
                .filter(|e| e.value().state.holds_reservation())
                .filter_map(|e| self.reservations.get(e.key()).map(|r| r.value().clone()))
                .collect())
        }

        async fn list_vms_by_project(&self, project_id: ProjectId) -> strato_types::StratoResult<Vec<Vm>> {
            Ok(self
                .vms
                .iter()
                .filter(|e| e.value().project_id == project_id)
                .map(|e| e.value().clone())
                .collect())
        }
    }

    async fn online_agent(registry: &Arc<dyn AgentRegistry>, cpu: u32, mem: u64, disk: u64) -> AgentId {
        let agent_id = AgentId::new();
        registry
            .register(
                agent_id,
                RegisterRequest {
                    name: "a".into(),
                    hostname: "a.local".into(),
                    version: "1.0".into(),
                    capabilities: BTreeSet::new(),
                    total: Resources::new(cpu, mem, disk),
                    certificate_serial: CertificateSerial(1),
                },
            )
            .await
            .unwrap();
        registry
            .heartbeat(agent_id, Resources::new(cpu, mem, disk), 0, Utc::now())
            .await
            .unwrap();
        agent_id
    }

    fn harness() -> (Coordinator, Arc<dyn AgentRegistry>, Arc<ChannelMap>, Arc<FakeVmStore>) {
        let registry: Arc<dyn AgentRegistry> = Arc::new(InMemoryAgentRegistry::new());
        let channels = Arc::new(ChannelMap::new());
        let vms = Arc::new(FakeVmStore::default());
        let coordinator = Coordinator::new(
            registry.clone(),
            Arc::new(AllowAllOracle),
            Arc::new(QuotaLedger::new(chrono::Duration::seconds(300))),
            Arc::new(Scheduler::new(SchedulingStrategyKind::LeastLoaded)),
            channels.clone(),
            vms.clone() as Arc<dyn VmStore>,
            std::time::Duration::from_secs(5),
        );
        (coordinator, registry, channels, vms)
    }

    fn ctx(project_id: ProjectId) -> ProjectContext {
        ProjectContext {
            project_id,
            organization_id: strato_types::OrganizationId::new(),
            environments: ["prod".to_string()].into_iter().collect(),
            scope_chain: vec![strato_types::QuotaScope::Project(project_id)],
        }
    }

    fn create_request() -> CreateVmRequest {
        CreateVmRequest {
            name: "vm1".into(),
            owner: UserId::new(),
            environment: "prod".into(),
            spec: VmSpec {
                requested: Resources::new(2, 2048, 2048),
                requires_kvm: false,
                requires_hvf: false,
            },
            scheduling_strategy: None,
        }
    }

    /// Spawns a task that auto-acks every `command` frame sent to `agent_id`,
    /// standing in for a real agent connection during these tests.
    fn auto_ack(channels: &Arc<ChannelMap>, agent_id: AgentId) {
        let (channel, mut rx) = strato_channel::AgentChannel::new(agent_id, std::time::Duration::from_secs(5));
        let channel = Arc::new(channel);
        channels.insert(channel.clone());
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let WireMessage::Command { id, .. } = message {
                    channel.resolve_reply(&id, ack_reply());
                }
            }
        });
    }

    #[tokio::test]
    async fn create_vm_reserves_schedules_and_starts() {
        let (coordinator, registry, channels, _vms) = harness();
        let agent_id = online_agent(&registry, 8, 8192, 8192).await;
        auto_ack(&channels, agent_id);

        let project_id = ProjectId::new();
        let vm = coordinator
            .create_vm("user1", &ctx(project_id), create_request())
            .await
            .unwrap();

        assert_eq!(vm.state, VmState::Starting);
        assert_eq!(vm.assigned_agent, Some(agent_id));

        let agent = registry.get(agent_id).await.unwrap();
        assert_eq!(agent.available, Resources::new(6, 6144, 6144));
    }

    #[tokio::test]
    async fn create_vm_with_unknown_environment_is_bad_request() {
        let (coordinator, _registry, _channels, _vms) = harness();
        let project_id = ProjectId::new();
        let mut req = create_request();
        req.environment = "staging".into();

        let err = coordinator.create_vm("user1", &ctx(project_id), req).await.unwrap_err();
        assert!(matches!(err, StratoError::BadRequest(_)));
    }

    #[tokio::test]
    async fn create_vm_with_no_agents_releases_the_ledger_reservation() {
        let (coordinator, _registry, _channels, _vms) = harness();
        let project_id = ProjectId::new();

        let err = coordinator
            .create_vm("user1", &ctx(project_id), create_request())
            .await
            .unwrap_err();
        assert!(matches!(err, StratoError::NoAgents));
    }

    #[tokio::test]
    async fn create_vm_with_agent_rejection_unwinds_reservations() {
        let (coordinator, registry, channels, _vms) = harness();
        let agent_id = online_agent(&registry, 8, 8192, 8192).await;

        let (channel, mut rx) = strato_channel::AgentChannel::new(agent_id, std::time::Duration::from_secs(5));
        let channel = Arc::new(channel);
        channels.insert(channel.clone());
        tokio::spawn(async move {
            if let Some(WireMessage::Command { id, .. }) = rx.recv().await {
                channel.resolve_reply(&id, error_reply("image_not_found", "no such image"));
            }
        });

        let project_id = ProjectId::new();
        let err = coordinator
            .create_vm("user1", &ctx(project_id), create_request())
            .await
            .unwrap_err();
        assert!(matches!(err, StratoError::BadRequest(_)));

        let agent = registry.get(agent_id).await.unwrap();
        assert_eq!(agent.available, Resources::new(8, 8192, 8192));
    }

    #[tokio::test]
    async fn restart_is_a_single_round_trip_from_running() {
        let (coordinator, registry, channels, vms) = harness();
        let agent_id = online_agent(&registry, 8, 8192, 8192).await;
        auto_ack(&channels, agent_id);

        let project_id = ProjectId::new();
        let vm = coordinator
            .create_vm("user1", &ctx(project_id), create_request())
            .await
            .unwrap();

        let mut running = vm.clone();
        running.transition(VmState::Running, Utc::now()).unwrap();
        vms.update(&running).await.unwrap();

        let restarted = coordinator.restart_vm("user1", vm.id).await.unwrap();
        assert_eq!(restarted.state, VmState::Starting);
    }
}
