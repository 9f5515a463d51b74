//! PostgreSQL storage backend (`storage.type = "postgres"`): one table per
//! entity, a JSONB `data` blob plus the scalar columns filters need, the
//! same shape this codebase's other storage modules use.

use super::traits::{
    ApiKey, ApiKeyStore, AgentStore, CertificateStore, GroupStore, OrganizationStore, OuStore,
    ProjectStore, QuotaStore, UserStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use strato_coordinator::VmStore;
use strato_types::{
    Agent, AgentId, ApiKeyId, AuditEntry, Certificate, CertificateSerial, Group, GroupId,
    Organization, OrganizationId, OrganizationalUnit, OuId, Project, ProjectId, QuotaId,
    Reservation, ResourceQuota, StratoError, StratoResult, User, UserId, Vm, VmId,
};
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

fn internal(e: impl std::error::Error + Send + Sync + 'static) -> StratoError {
    StratoError::internal(e)
}

fn to_json<T: serde::Serialize>(value: &T) -> StratoResult<Value> {
    serde_json::to_value(value).map_err(internal)
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> StratoResult<T> {
    serde_json::from_value(value).map_err(internal)
}

fn not_found(what: &str, id: impl std::fmt::Display) -> StratoError {
    StratoError::NotFound(format!("{what} {id} not found"))
}

impl PostgresStorage {
    pub async fn new(url: &str, max_connections: u32, connect_timeout_secs: u64) -> StratoResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(internal)?;

        let storage = Self { pool };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    async fn initialize_schema(&self) -> StratoResult<()> {
        let statements = [
            r#"CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY, display_name TEXT NOT NULL, is_system_admin BOOLEAN NOT NULL,
                data JSONB NOT NULL, created_at TIMESTAMPTZ NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS organizations (
                id UUID PRIMARY KEY, name TEXT NOT NULL, data JSONB NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS organizational_units (
                id UUID PRIMARY KEY, organization_id UUID NOT NULL, name TEXT NOT NULL, data JSONB NOT NULL
            );"#,
            r#"CREATE INDEX IF NOT EXISTS ous_organization_id ON organizational_units(organization_id);"#,
            r#"CREATE TABLE IF NOT EXISTS projects (
                id UUID PRIMARY KEY, organization_id UUID NOT NULL, name TEXT NOT NULL, data JSONB NOT NULL
            );"#,
            r#"CREATE INDEX IF NOT EXISTS projects_organization_id ON projects(organization_id);"#,
            r#"CREATE TABLE IF NOT EXISTS groups_ (
                id UUID PRIMARY KEY, organization_id UUID NOT NULL, name TEXT NOT NULL, data JSONB NOT NULL
            );"#,
            r#"CREATE INDEX IF NOT EXISTS groups_organization_id ON groups_(organization_id);"#,
            r#"CREATE TABLE IF NOT EXISTS resource_quotas (
                id UUID PRIMARY KEY, data JSONB NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS agents (
                id UUID PRIMARY KEY, name TEXT NOT NULL, data JSONB NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS certificates (
                serial TEXT PRIMARY KEY, subject_agent_id UUID NOT NULL, status TEXT NOT NULL, data JSONB NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS certificate_revocations (
                serial TEXT PRIMARY KEY, reason TEXT NOT NULL, revoked_at TIMESTAMPTZ NOT NULL
            );"#,
            r#"CREATE TABLE IF NOT EXISTS api_keys (
                id UUID PRIMARY KEY, user_id UUID NOT NULL, key_digest BYTEA NOT NULL, revoked BOOLEAN NOT NULL, data JSONB NOT NULL
            );"#,
            r#"CREATE INDEX IF NOT EXISTS api_keys_digest ON api_keys(key_digest);"#,
            r#"CREATE TABLE IF NOT EXISTS vms (
                id UUID PRIMARY KEY, project_id UUID NOT NULL, assigned_agent_id UUID, state TEXT NOT NULL,
                data JSONB NOT NULL, created_at TIMESTAMPTZ NOT NULL, updated_at TIMESTAMPTZ NOT NULL
            );"#,
            r#"CREATE INDEX IF NOT EXISTS vms_project_id ON vms(project_id);"#,
            r#"CREATE INDEX IF NOT EXISTS vms_assigned_agent_id ON vms(assigned_agent_id);"#,
            r#"CREATE TABLE IF NOT EXISTS reservations (
                id UUID PRIMARY KEY, vm_id UUID NOT NULL, project_id UUID NOT NULL, environment TEXT NOT NULL,
                amount JSONB NOT NULL, committed BOOLEAN NOT NULL, created_at TIMESTAMPTZ NOT NULL
            );"#,
            r#"CREATE INDEX IF NOT EXISTS reservations_vm_id ON reservations(vm_id);"#,
            r#"CREATE TABLE IF NOT EXISTS audit_log (
                id UUID PRIMARY KEY, actor TEXT NOT NULL, action TEXT NOT NULL, vm_id UUID NOT NULL,
                project_id UUID NOT NULL, details JSONB NOT NULL, recorded_at TIMESTAMPTZ NOT NULL
            );"#,
            r#"CREATE INDEX IF NOT EXISTS audit_log_vm_id ON audit_log(vm_id);"#,
        ];

        for stmt in statements {
            sqlx::query(stmt).execute(&self.pool).await.map_err(internal)?;
        }
        Ok(())
    }
}

fn serial_key(serial: CertificateSerial) -> String {
    format!("{:032x}", serial.0)
}

#[async_trait]
impl UserStore for PostgresStorage {
    async fn create_user(&self, user: &User) -> StratoResult<()> {
        let data = to_json(user)?;
        sqlx::query(
            "INSERT INTO users (id, display_name, is_system_admin, data, created_at) VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET display_name = EXCLUDED.display_name, data = EXCLUDED.data",
        )
        .bind(user.id.as_uuid())
        .bind(&user.display_name)
        .bind(user.is_system_admin)
        .bind(data)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> StratoResult<User> {
        let row = sqlx::query("SELECT data FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("user", id))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn list_users(&self) -> StratoResult<Vec<User>> {
        let rows = sqlx::query("SELECT data FROM users").fetch_all(&self.pool).await.map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }
}

#[async_trait]
impl OrganizationStore for PostgresStorage {
    async fn create_organization(&self, org: &Organization) -> StratoResult<()> {
        let data = to_json(org)?;
        sqlx::query(
            "INSERT INTO organizations (id, name, data) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, data = EXCLUDED.data",
        )
        .bind(org.id.as_uuid())
        .bind(&org.name)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_organization(&self, id: OrganizationId) -> StratoResult<Organization> {
        let row = sqlx::query("SELECT data FROM organizations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("organization", id))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn list_organizations(&self) -> StratoResult<Vec<Organization>> {
        let rows = sqlx::query("SELECT data FROM organizations").fetch_all(&self.pool).await.map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn delete_organization(&self, id: OrganizationId) -> StratoResult<()> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        if result.rows_affected() == 0 {
            return Err(not_found("organization", id));
        }
        Ok(())
    }
}

#[async_trait]
impl OuStore for PostgresStorage {
    async fn create_ou(&self, ou: &OrganizationalUnit) -> StratoResult<()> {
        let data = to_json(ou)?;
        sqlx::query(
            "INSERT INTO organizational_units (id, organization_id, name, data) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, data = EXCLUDED.data",
        )
        .bind(ou.id.as_uuid())
        .bind(ou.organization_id.as_uuid())
        .bind(&ou.name)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_ou(&self, id: OuId) -> StratoResult<OrganizationalUnit> {
        let row = sqlx::query("SELECT data FROM organizational_units WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("organizational unit", id))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn list_ous_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<OrganizationalUnit>> {
        let rows = sqlx::query("SELECT data FROM organizational_units WHERE organization_id = $1")
            .bind(org_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn update_ou(&self, ou: &OrganizationalUnit) -> StratoResult<()> {
        self.create_ou(ou).await
    }

    async fn delete_ou(&self, id: OuId) -> StratoResult<()> {
        let result = sqlx::query("DELETE FROM organizational_units WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        if result.rows_affected() == 0 {
            return Err(not_found("organizational unit", id));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for PostgresStorage {
    async fn create_project(&self, project: &Project) -> StratoResult<()> {
        let data = to_json(project)?;
        sqlx::query(
            "INSERT INTO projects (id, organization_id, name, data) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, data = EXCLUDED.data",
        )
        .bind(project.id.as_uuid())
        .bind(project.organization_id.as_uuid())
        .bind(&project.name)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_project(&self, id: ProjectId) -> StratoResult<Project> {
        let row = sqlx::query("SELECT data FROM projects WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("project", id))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn list_projects_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<Project>> {
        let rows = sqlx::query("SELECT data FROM projects WHERE organization_id = $1")
            .bind(org_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn update_project(&self, project: &Project) -> StratoResult<()> {
        self.create_project(project).await
    }

    async fn delete_project(&self, id: ProjectId) -> StratoResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        if result.rows_affected() == 0 {
            return Err(not_found("project", id));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupStore for PostgresStorage {
    async fn create_group(&self, group: &Group) -> StratoResult<()> {
        let data = to_json(group)?;
        sqlx::query(
            "INSERT INTO groups_ (id, organization_id, name, data) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, data = EXCLUDED.data",
        )
        .bind(group.id.as_uuid())
        .bind(group.organization_id.as_uuid())
        .bind(&group.name)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_group(&self, id: GroupId) -> StratoResult<Group> {
        let row = sqlx::query("SELECT data FROM groups_ WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("group", id))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn list_groups_by_organization(&self, org_id: OrganizationId) -> StratoResult<Vec<Group>> {
        let rows = sqlx::query("SELECT data FROM groups_ WHERE organization_id = $1")
            .bind(org_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn update_group(&self, group: &Group) -> StratoResult<()> {
        self.create_group(group).await
    }

    async fn delete_group(&self, id: GroupId) -> StratoResult<()> {
        let result = sqlx::query("DELETE FROM groups_ WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        if result.rows_affected() == 0 {
            return Err(not_found("group", id));
        }
        Ok(())
    }
}

#[async_trait]
impl QuotaStore for PostgresStorage {
    async fn create_quota(&self, quota: &ResourceQuota) -> StratoResult<()> {
        let data = to_json(quota)?;
        sqlx::query(
            "INSERT INTO resource_quotas (id, data) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(quota.id.as_uuid())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_quota(&self, id: QuotaId) -> StratoResult<ResourceQuota> {
        let row = sqlx::query("SELECT data FROM resource_quotas WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("quota", id))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn list_quotas(&self) -> StratoResult<Vec<ResourceQuota>> {
        let rows = sqlx::query("SELECT data FROM resource_quotas").fetch_all(&self.pool).await.map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn delete_quota(&self, id: QuotaId) -> StratoResult<()> {
        let result = sqlx::query("DELETE FROM resource_quotas WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        if result.rows_affected() == 0 {
            return Err(not_found("quota", id));
        }
        Ok(())
    }
}

#[async_trait]
impl AgentStore for PostgresStorage {
    async fn upsert_agent(&self, agent: &Agent) -> StratoResult<()> {
        let data = to_json(agent)?;
        sqlx::query(
            "INSERT INTO agents (id, name, data) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, data = EXCLUDED.data",
        )
        .bind(agent.id.as_uuid())
        .bind(&agent.name)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> StratoResult<Agent> {
        let row = sqlx::query("SELECT data FROM agents WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("agent", id))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn list_agents(&self) -> StratoResult<Vec<Agent>> {
        let rows = sqlx::query("SELECT data FROM agents").fetch_all(&self.pool).await.map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }
}

#[async_trait]
impl CertificateStore for PostgresStorage {
    async fn insert_certificate(&self, cert: &Certificate) -> StratoResult<()> {
        let data = to_json(cert)?;
        let serial = serial_key(cert.serial);
        sqlx::query(
            "INSERT INTO certificates (serial, subject_agent_id, status, data) VALUES ($1, $2, $3, $4)
             ON CONFLICT (serial) DO UPDATE SET status = EXCLUDED.status, data = EXCLUDED.data",
        )
        .bind(serial)
        .bind(cert.subject_agent_id.as_uuid())
        .bind(format!("{:?}", cert.status))
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get_certificate(&self, serial: CertificateSerial) -> StratoResult<Certificate> {
        let key = serial_key(serial);
        let row = sqlx::query("SELECT data FROM certificates WHERE serial = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("certificate", serial))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn list_certificates(&self) -> StratoResult<Vec<Certificate>> {
        let rows = sqlx::query("SELECT data FROM certificates").fetch_all(&self.pool).await.map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn mark_revoked(&self, serial: CertificateSerial, reason: &str, revoked_at: DateTime<Utc>) -> StratoResult<()> {
        let mut cert = self.get_certificate(serial).await?;
        cert.status = strato_types::CertificateStatus::Revoked;
        cert.revoked_at = Some(revoked_at);
        cert.revocation_reason = Some(reason.to_string());
        self.insert_certificate(&cert).await?;

        let key = serial_key(serial);
        sqlx::query(
            "INSERT INTO certificate_revocations (serial, reason, revoked_at) VALUES ($1, $2, $3)
             ON CONFLICT (serial) DO UPDATE SET reason = EXCLUDED.reason, revoked_at = EXCLUDED.revoked_at",
        )
        .bind(key)
        .bind(reason)
        .bind(revoked_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }
}

#[async_trait]
impl ApiKeyStore for PostgresStorage {
    async fn create_api_key(&self, key: &ApiKey) -> StratoResult<()> {
        let data = to_json(key)?;
        sqlx::query(
            "INSERT INTO api_keys (id, user_id, key_digest, revoked, data) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(key.id.as_uuid())
        .bind(key.user_id.as_uuid())
        .bind(key.key_digest.as_slice())
        .bind(key.revoked)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn find_by_digest(&self, digest: &[u8; 32]) -> StratoResult<Option<ApiKey>> {
        let row = sqlx::query("SELECT data FROM api_keys WHERE key_digest = $1")
            .bind(digest.as_slice())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        match row {
            Some(row) => Ok(Some(from_json(row.try_get("data").map_err(internal)?)?)),
            None => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: UserId) -> StratoResult<Vec<ApiKey>> {
        let rows = sqlx::query("SELECT data FROM api_keys WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn revoke_api_key(&self, id: ApiKeyId) -> StratoResult<()> {
        let result = sqlx::query("UPDATE api_keys SET revoked = true WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        if result.rows_affected() == 0 {
            return Err(not_found("api key", id));
        }
        Ok(())
    }
}

fn reservation_from_row(row: &sqlx::postgres::PgRow) -> StratoResult<Reservation> {
    Ok(Reservation {
        id: strato_types::ReservationId::from_uuid(row.try_get("id").map_err(internal)?),
        vm_id: VmId::from_uuid(row.try_get("vm_id").map_err(internal)?),
        project_id: ProjectId::from_uuid(row.try_get("project_id").map_err(internal)?),
        environment: row.try_get("environment").map_err(internal)?,
        amount: from_json(row.try_get("amount").map_err(internal)?)?,
        committed: row.try_get("committed").map_err(internal)?,
        created_at: row.try_get("created_at").map_err(internal)?,
    })
}

#[async_trait]
impl VmStore for PostgresStorage {
    async fn insert(&self, vm: &Vm, reservation: &Reservation, audit: &AuditEntry) -> StratoResult<()> {
        let vm_data = to_json(vm)?;
        let amount = to_json(&reservation.amount)?;
        let details = audit.details.clone();

        let mut tx = self.pool.begin().await.map_err(internal)?;

        sqlx::query(
            r#"
            INSERT INTO vms (id, project_id, assigned_agent_id, state, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                assigned_agent_id = EXCLUDED.assigned_agent_id,
                state = EXCLUDED.state,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(vm.id.as_uuid())
        .bind(vm.project_id.as_uuid())
        .bind(vm.assigned_agent.map(|a| a.as_uuid()))
        .bind(format!("{:?}", vm.state))
        .bind(vm_data)
        .bind(vm.created_at)
        .bind(vm.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        sqlx::query(
            "INSERT INTO reservations (id, vm_id, project_id, environment, amount, committed, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.vm_id.as_uuid())
        .bind(reservation.project_id.as_uuid())
        .bind(&reservation.environment)
        .bind(amount)
        .bind(reservation.committed)
        .bind(reservation.created_at)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        sqlx::query(
            "INSERT INTO audit_log (id, actor, action, vm_id, project_id, details, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(&audit.actor)
        .bind(&audit.action)
        .bind(audit.vm_id.as_uuid())
        .bind(audit.project_id.as_uuid())
        .bind(details)
        .bind(audit.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)?;
        Ok(())
    }

    async fn update(&self, vm: &Vm) -> StratoResult<()> {
        let data = to_json(vm)?;
        sqlx::query(
            r#"
            INSERT INTO vms (id, project_id, assigned_agent_id, state, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                assigned_agent_id = EXCLUDED.assigned_agent_id,
                state = EXCLUDED.state,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(vm.id.as_uuid())
        .bind(vm.project_id.as_uuid())
        .bind(vm.assigned_agent.map(|a| a.as_uuid()))
        .bind(format!("{:?}", vm.state))
        .bind(data)
        .bind(vm.created_at)
        .bind(vm.updated_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn get(&self, vm_id: VmId) -> StratoResult<Vm> {
        let row = sqlx::query("SELECT data FROM vms WHERE id = $1")
            .bind(vm_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| not_found("vm", vm_id))?;
        from_json(row.try_get("data").map_err(internal)?)
    }

    async fn mark_reservation_committed(&self, vm_id: VmId) -> StratoResult<()> {
        let result = sqlx::query("UPDATE reservations SET committed = true WHERE vm_id = $1")
            .bind(vm_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        if result.rows_affected() == 0 {
            return Err(not_found("reservation for vm", vm_id));
        }
        Ok(())
    }

    async fn list_open_reservations(&self) -> StratoResult<Vec<Reservation>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.vm_id, r.project_id, r.environment, r.amount, r.committed, r.created_at
            FROM reservations r
            JOIN vms v ON v.id = r.vm_id
            WHERE v.state IN ('Scheduled', 'Starting', 'Running', 'Stopping')
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn list_reserved_by_agent(&self, agent_id: AgentId) -> StratoResult<Vec<Vm>> {
        let rows = sqlx::query(
            "SELECT data FROM vms WHERE assigned_agent_id = $1 AND state IN ('Scheduled', 'Starting', 'Running', 'Stopping')",
        )
        .bind(agent_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn list_all_reserved(&self) -> StratoResult<Vec<Vm>> {
        let rows = sqlx::query("SELECT data FROM vms WHERE state IN ('Scheduled', 'Starting', 'Running', 'Stopping')")
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }

    async fn list_vms_by_project(&self, project_id: ProjectId) -> StratoResult<Vec<Vm>> {
        let rows = sqlx::query("SELECT data FROM vms WHERE project_id = $1")
            .bind(project_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter().map(|r| from_json(r.try_get("data").map_err(internal)?)).collect()
    }
}
