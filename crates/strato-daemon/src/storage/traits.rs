//! Persistence seams (§10.4): one narrow trait per entity family, composed
//! into a single `Storage` supertrait the HTTP handlers depend on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strato_types::{
    Agent, ApiKeyId, Certificate, CertificateSerial, Group, GroupId, Organization, OrganizationId,
    OrganizationalUnit, OuId, Project, ProjectId, QuotaId, ResourceQuota, StratoResult, User, UserId,
};

/// A bearer API key record. Only a blake3 digest of the key material is
/// ever persisted; the plaintext `sk_…` value is returned once, at
/// creation time, and never again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: ApiKeyId,
    pub user_id: UserId,
    pub name: String,
    pub key_digest: [u8; 32],
    pub created_at: DateTime<Utc>,
    pub revoked: bool,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> StratoResult<()>;
    async fn get_user(&self, id: UserId) -> StratoResult<User>;
    async fn list_users(&self) -> StratoResult<Vec<User>>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn create_organization(&self, org: &Organization) -> StratoResult<()>;
    async fn get_organization(&self, id: OrganizationId) -> StratoResult<Organization>;
    async fn list_organizations(&self) -> StratoResult<Vec<Organization>>;
    async fn delete_organization(&self, id: OrganizationId) -> StratoResult<()>;
}

#[async_trait]
pub trait OuStore: Send + Sync {
    async fn create_ou(&self, ou: &OrganizationalUnit) -> StratoResult<()>;
    async fn get_ou(&self, id: OuId) -> StratoResult<OrganizationalUnit>;
    async fn list_ous_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<OrganizationalUnit>>;
    async fn update_ou(&self, ou: &OrganizationalUnit) -> StratoResult<()>;
    async fn delete_ou(&self, id: OuId) -> StratoResult<()>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn create_project(&self, project: &Project) -> StratoResult<()>;
    async fn get_project(&self, id: ProjectId) -> StratoResult<Project>;
    async fn list_projects_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<Project>>;
    async fn update_project(&self, project: &Project) -> StratoResult<()>;
    async fn delete_project(&self, id: ProjectId) -> StratoResult<()>;
}

#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn create_group(&self, group: &Group) -> StratoResult<()>;
    async fn get_group(&self, id: GroupId) -> StratoResult<Group>;
    async fn list_groups_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<Group>>;
    async fn update_group(&self, group: &Group) -> StratoResult<()>;
    async fn delete_group(&self, id: GroupId) -> StratoResult<()>;
}

/// Declared quota definitions (scope + maxima). Live `reserved` counters are
/// not duplicated here — callers read those from the `QuotaLedger` by id.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn create_quota(&self, quota: &ResourceQuota) -> StratoResult<()>;
    async fn get_quota(&self, id: QuotaId) -> StratoResult<ResourceQuota>;
    async fn list_quotas(&self) -> StratoResult<Vec<ResourceQuota>>;
    async fn delete_quota(&self, id: QuotaId) -> StratoResult<()>;
}

/// Persisted agent metadata, mirrored from the live `AgentRegistry` on
/// register/heartbeat so the HTTP surface can list agents across restarts
/// without depending on the in-memory registry alone.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn upsert_agent(&self, agent: &Agent) -> StratoResult<()>;
    async fn get_agent(&self, id: strato_types::AgentId) -> StratoResult<Agent>;
    async fn list_agents(&self) -> StratoResult<Vec<Agent>>;
}

#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn insert_certificate(&self, cert: &Certificate) -> StratoResult<()>;
    async fn get_certificate(&self, serial: CertificateSerial) -> StratoResult<Certificate>;
    async fn list_certificates(&self) -> StratoResult<Vec<Certificate>>;
    async fn mark_revoked(&self, serial: CertificateSerial, reason: &str, revoked_at: DateTime<Utc>) -> StratoResult<()>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn create_api_key(&self, key: &ApiKey) -> StratoResult<()>;
    async fn find_by_digest(&self, digest: &[u8; 32]) -> StratoResult<Option<ApiKey>>;
    async fn list_by_user(&self, user_id: UserId) -> StratoResult<Vec<ApiKey>>;
    async fn revoke_api_key(&self, id: ApiKeyId) -> StratoResult<()>;
}

/// The full persistence surface a storage backend must implement, plus the
/// Coordinator's own `VmStore` seam (`strato_coordinator::VmStore`).
pub trait Storage:
    UserStore
    + OrganizationStore
    + OuStore
    + ProjectStore
    + GroupStore
    + QuotaStore
    + AgentStore
    + CertificateStore
    + ApiKeyStore
    + strato_coordinator::VmStore
    + Send
    + Sync
{
}

impl<T> Storage for T where
    T: UserStore
        + OrganizationStore
        + OuStore
        + ProjectStore
        + GroupStore
        + QuotaStore
        + AgentStore
        + CertificateStore
        + ApiKeyStore
        + strato_coordinator::VmStore
        + Send
        + Sync
{
}
