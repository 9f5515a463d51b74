//! In-memory storage backend (`storage.type = "memory"`): development and
//! test default, `DashMap`-per-entity, the same concurrency primitive the
//! Registry and Ledger use for their own live state.

use super::traits::{
    ApiKey, ApiKeyStore, AgentStore, CertificateStore, GroupStore, OrganizationStore, OuStore,
    ProjectStore, QuotaStore, UserStore,
};
use async_trait::async_trait;
use dashmap::DashMap;
use strato_coordinator::VmStore;
use strato_types::{
    Agent, AgentId, ApiKeyId, AuditEntry, Certificate, CertificateSerial, Group, GroupId,
    Organization, OrganizationId, OrganizationalUnit, OuId, Project, ProjectId, QuotaId,
    Reservation, ResourceQuota, StratoError, StratoResult, User, UserId, Vm, VmId,
};

#[derive(Default)]
pub struct InMemoryStorage {
    users: DashMap<UserId, User>,
    organizations: DashMap<OrganizationId, Organization>,
    ous: DashMap<OuId, OrganizationalUnit>,
    projects: DashMap<ProjectId, Project>,
    groups: DashMap<GroupId, Group>,
    quotas: DashMap<QuotaId, ResourceQuota>,
    agents: DashMap<AgentId, Agent>,
    certificates: DashMap<CertificateSerial, Certificate>,
    api_keys: DashMap<ApiKeyId, ApiKey>,
    vms: DashMap<VmId, Vm>,
    reservations: DashMap<VmId, Reservation>,
    audit_log: DashMap<uuid::Uuid, AuditEntry>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(what: &str, id: impl std::fmt::Display) -> StratoError {
    StratoError::NotFound(format!("{what} {id} not found"))
}

#[async_trait]
impl UserStore for InMemoryStorage {
    async fn create_user(&self, user: &User) -> StratoResult<()> {
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> StratoResult<User> {
        self.users.get(&id).map(|u| u.clone()).ok_or_else(|| not_found("user", id))
    }

    async fn list_users(&self) -> StratoResult<Vec<User>> {
        Ok(self.users.iter().map(|e| e.value().clone()).collect())
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStorage {
    async fn create_organization(&self, org: &Organization) -> StratoResult<()> {
        self.organizations.insert(org.id, org.clone());
        Ok(())
    }

    async fn get_organization(&self, id: OrganizationId) -> StratoResult<Organization> {
        self.organizations.get(&id).map(|o| o.clone()).ok_or_else(|| not_found("organization", id))
    }

    async fn list_organizations(&self) -> StratoResult<Vec<Organization>> {
        Ok(self.organizations.iter().map(|e| e.value().clone()).collect())
    }

    async fn delete_organization(&self, id: OrganizationId) -> StratoResult<()> {
        self.organizations.remove(&id).ok_or_else(|| not_found("organization", id))?;
        Ok(())
    }
}

#[async_trait]
impl OuStore for InMemoryStorage {
    async fn create_ou(&self, ou: &OrganizationalUnit) -> StratoResult<()> {
        self.ous.insert(ou.id, ou.clone());
        Ok(())
    }

    async fn get_ou(&self, id: OuId) -> StratoResult<OrganizationalUnit> {
        self.ous.get(&id).map(|o| o.clone()).ok_or_else(|| not_found("organizational unit", id))
    }

    async fn list_ous_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<OrganizationalUnit>> {
        Ok(self.ous.iter().filter(|e| e.value().organization_id == org_id).map(|e| e.value().clone()).collect())
    }

    async fn update_ou(&self, ou: &OrganizationalUnit) -> StratoResult<()> {
        if !self.ous.contains_key(&ou.id) {
            return Err(not_found("organizational unit", ou.id));
        }
        self.ous.insert(ou.id, ou.clone());
        Ok(())
    }

    async fn delete_ou(&self, id: OuId) -> StratoResult<()> {
        self.ous.remove(&id).ok_or_else(|| not_found("organizational unit", id))?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for InMemoryStorage {
    async fn create_project(&self, project: &Project) -> StratoResult<()> {
        self.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, id: ProjectId) -> StratoResult<Project> {
        self.projects.get(&id).map(|p| p.clone()).ok_or_else(|| not_found("project", id))
    }

    async fn list_projects_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<Project>> {
        Ok(self.projects.iter().filter(|e| e.value().organization_id == org_id).map(|e| e.value().clone()).collect())
    }

    async fn update_project(&self, project: &Project) -> StratoResult<()> {
        if !self.projects.contains_key(&project.id) {
            return Err(not_found("project", project.id));
        }
        self.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn delete_project(&self, id: ProjectId) -> StratoResult<()> {
        self.projects.remove(&id).ok_or_else(|| not_found("project", id))?;
        Ok(())
    }
}

#[async_trait]
impl GroupStore for InMemoryStorage {
    async fn create_group(&self, group: &Group) -> StratoResult<()> {
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> StratoResult<Group> {
        self.groups.get(&id).map(|g| g.clone()).ok_or_else(|| not_found("group", id))
    }

    async fn list_groups_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<Group>> {
        Ok(self.groups.iter().filter(|e| e.value().organization_id == org_id).map(|e| e.value().clone()).collect())
    }

    async fn update_group(&self, group: &Group) -> StratoResult<()> {
        if !self.groups.contains_key(&group.id) {
            return Err(not_found("group", group.id));
        }
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn delete_group(&self, id: GroupId) -> StratoResult<()> {
        self.groups.remove(&id).ok_or_else(|| not_found("group", id))?;
        Ok(())
    }
}

#[async_trait]
impl QuotaStore for InMemoryStorage {
    async fn create_quota(&self, quota: &ResourceQuota) -> StratoResult<()> {
        self.quotas.insert(quota.id, quota.clone());
        Ok(())
    }

    async fn get_quota(&self, id: QuotaId) -> StratoResult<ResourceQuota> {
        self.quotas.get(&id).map(|q| q.clone()).ok_or_else(|| not_found("quota", id))
    }

    async fn list_quotas(&self) -> StratoResult<Vec<ResourceQuota>> {
        Ok(self.quotas.iter().map(|e| e.value().clone()).collect())
    }

    async fn delete_quota(&self, id: QuotaId) -> StratoResult<()> {
        self.quotas.remove(&id).ok_or_else(|| not_found("quota", id))?;
        Ok(())
    }
}

#[async_trait]
impl AgentStore for InMemoryStorage {
    async fn upsert_agent(&self, agent: &Agent) -> StratoResult<()> {
        self.agents.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> StratoResult<Agent> {
        self.agents.get(&id).map(|a| a.clone()).ok_or_else(|| not_found("agent", id))
    }

    async fn list_agents(&self) -> StratoResult<Vec<Agent>> {
        Ok(self.agents.iter().map(|e| e.value().clone()).collect())
    }
}

#[async_trait]
impl CertificateStore for InMemoryStorage {
    async fn insert_certificate(&self, cert: &Certificate) -> StratoResult<()> {
        self.certificates.insert(cert.serial, cert.clone());
        Ok(())
    }

    async fn get_certificate(&self, serial: CertificateSerial) -> StratoResult<Certificate> {
        self.certificates.get(&serial).map(|c| c.clone()).ok_or_else(|| not_found("certificate", serial))
    }

    async fn list_certificates(&self) -> StratoResult<Vec<Certificate>> {
        Ok(self.certificates.iter().map(|e| e.value().clone()).collect())
    }

    async fn mark_revoked(&self, serial: CertificateSerial, reason: &str, revoked_at: chrono::DateTime<chrono::Utc>) -> StratoResult<()> {
        let mut cert = self.certificates.get_mut(&serial).ok_or_else(|| not_found("certificate", serial))?;
        cert.status = strato_types::CertificateStatus::Revoked;
        cert.revoked_at = Some(revoked_at);
        cert.revocation_reason = Some(reason.to_string());
        Ok(())
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryStorage {
    async fn create_api_key(&self, key: &ApiKey) -> StratoResult<()> {
        self.api_keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn find_by_digest(&self, digest: &[u8; 32]) -> StratoResult<Option<ApiKey>> {
        Ok(self.api_keys.iter().find(|e| &e.value().key_digest == digest).map(|e| e.value().clone()))
    }

    async fn list_by_user(&self, user_id: UserId) -> StratoResult<Vec<ApiKey>> {
        Ok(self.api_keys.iter().filter(|e| e.value().user_id == user_id).map(|e| e.value().clone()).collect())
    }

    async fn revoke_api_key(&self, id: ApiKeyId) -> StratoResult<()> {
        let mut key = self.api_keys.get_mut(&id).ok_or_else(|| not_found("api key", id))?;
        key.revoked = true;
        Ok(())
    }
}

#[async_trait]
impl VmStore for InMemoryStorage {
    async fn insert(&self, vm: &Vm, reservation: &Reservation, audit: &AuditEntry) -> StratoResult<()> {
        // A single-process map insert is already atomic across the three
        // entries; the ordering (VM, then reservation, then audit) mirrors
        // the Postgres backend's transaction so the two stay interchangeable.
        self.vms.insert(vm.id, vm.clone());
        self.reservations.insert(vm.id, reservation.clone());
        self.audit_log.insert(uuid::Uuid::new_v4(), audit.clone());
        Ok(())
    }

    async fn update(&self, vm: &Vm) -> StratoResult<()> {
        if !self.vms.contains_key(&vm.id) {
            return Err(not_found("vm", vm.id));
        }
        self.vms.insert(vm.id, vm.clone());
        Ok(())
    }

    async fn get(&self, vm_id: VmId) -> StratoResult<Vm> {
        self.vms.get(&vm_id).map(|v| v.clone()).ok_or_else(|| not_found("vm", vm_id))
    }

    async fn mark_reservation_committed(&self, vm_id: VmId) -> StratoResult<()> {
        let mut reservation = self.reservations.get_mut(&vm_id).ok_or_else(|| not_found("reservation", vm_id))?;
        reservation.committed = true;
        Ok(())
    }

    async fn list_reserved_by_agent(&self, agent_id: AgentId) -> StratoResult<Vec<Vm>> {
        Ok(self
            .vms
            .iter()
            .filter(|e| e.value().assigned_agent == Some(agent_id) && e.value().state.holds_reservation())
            .map(|e| e.value().clone())
            .collect())
    }

    async fn list_all_reserved(&self) -> StratoResult<Vec<Vm>> {
        Ok(self.vms.iter().filter(|e| e.value().state.holds_reservation()).map(|e| e.value().clone()).collect())
    }

    async fn list_open_reservations(&self) -> StratoResult<Vec<Reservation>> {
        Ok(self
            .vms
            .iter()
            .filter(|e| e.value().state.holds_reservation())
            .filter_map(|e| self.reservations.get(e.key()).map(|r| r.value().clone()))
            .collect())
    }

    async fn list_vms_by_project(&self, project_id: ProjectId) -> StratoResult<Vec<Vm>> {
        Ok(self.vms.iter().filter(|e| e.value().project_id == project_id).map(|e| e.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn organization_round_trips() {
        let storage = InMemoryStorage::new();
        let org = Organization {
            id: OrganizationId::new(),
            name: "acme".into(),
            description: "".into(),
        };
        storage.create_organization(&org).await.unwrap();
        let fetched = storage.get_organization(org.id).await.unwrap();
        assert_eq!(fetched.name, "acme");
        assert_eq!(storage.list_organizations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_missing_vm_is_not_found() {
        let storage = InMemoryStorage::new();
        let err = storage.get(VmId::new()).await.unwrap_err();
        assert!(matches!(err, StratoError::NotFound(_)));
    }
}
