//! Resource quota CRUD (§4.6). Declared maxima live in both the durable
//! `QuotaStore` and the live `QuotaLedger` — the ledger is the source of
//! truth for `reserved`, storage is the source of truth for `max`/`scope`
//! across a restart, and every write here keeps the two in lockstep.

use crate::api::rest::state::AppState;
use crate::api::rest::auth::AuthedUser;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use strato_oracle::Permission;
use strato_types::{QuotaId, QuotaLimits, QuotaScope, Resources, ResourceQuota};

use super::require_permission;

fn scope_resource(scope: &QuotaScope) -> String {
    match scope {
        QuotaScope::Organization(id) => id.to_string(),
        QuotaScope::OrganizationalUnit(id) => id.to_string(),
        QuotaScope::Project(id) => id.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotaRequest {
    pub scope: QuotaScope,
    pub environment: Option<String>,
    pub max_cpu: u32,
    pub max_memory: u64,
    pub max_disk: u64,
    pub max_vm_count: u32,
}

pub async fn create_quota(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Json(request): Json<CreateQuotaRequest>,
) -> ApiResult<Json<ResourceQuota>> {
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageQuotas,
        &scope_resource(&request.scope),
    )
    .await?;

    let quota = ResourceQuota {
        id: QuotaId::new(),
        scope: request.scope,
        environment: request.environment,
        max: QuotaLimits {
            resources: Resources::new(request.max_cpu, request.max_memory, request.max_disk),
            vm_count: request.max_vm_count,
        },
        reserved: QuotaLimits::default(),
        enabled: true,
    };
    state.storage.create_quota(&quota).await?;
    state.ledger.insert_quota(quota.clone());
    tracing::info!(quota_id = %quota.id, "created quota");
    Ok(Json(quota))
}

/// Prefers the Ledger's live view (current `reserved` counters) and falls
/// back to the persisted definition for a quota the Ledger hasn't loaded
/// yet — e.g. immediately after a restart, before reconciliation runs.
pub async fn get_quota(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(id): Path<QuotaId>,
) -> ApiResult<Json<ResourceQuota>> {
    if let Some(quota) = state.ledger.get_quota(id).await {
        return Ok(Json(quota));
    }
    Ok(Json(state.storage.get_quota(id).await?))
}

pub async fn list_quotas(State(state): State<AppState>, AuthedUser(_caller): AuthedUser) -> ApiResult<Json<Vec<ResourceQuota>>> {
    let mut quotas = Vec::new();
    for persisted in state.storage.list_quotas().await? {
        let live = state.ledger.get_quota(persisted.id).await;
        quotas.push(live.unwrap_or(persisted));
    }
    Ok(Json(quotas))
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuotaMaxRequest {
    pub max_cpu: u32,
    pub max_memory: u64,
    pub max_disk: u64,
    pub max_vm_count: u32,
}

/// Lowering a max below what is currently reserved is rejected by the
/// Ledger (`ResourceQuota::can_lower_max_to`); raising it always succeeds.
pub async fn update_quota_max(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<QuotaId>,
    Json(request): Json<UpdateQuotaMaxRequest>,
) -> ApiResult<Json<ResourceQuota>> {
    let current = state.storage.get_quota(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageQuotas,
        &scope_resource(&current.scope),
    )
    .await?;

    let new_max = QuotaLimits {
        resources: Resources::new(request.max_cpu, request.max_memory, request.max_disk),
        vm_count: request.max_vm_count,
    };
    state.ledger.update_max(id, new_max).await.map_err(strato_types::StratoError::from)?;

    let updated = state.ledger.get_quota(id).await.unwrap_or(current);
    state.storage.create_quota(&updated).await?;
    Ok(Json(updated))
}

pub async fn delete_quota(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<QuotaId>,
) -> ApiResult<Json<super::DeleteResponse>> {
    let current = state.storage.get_quota(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageQuotas,
        &scope_resource(&current.scope),
    )
    .await?;

    state.ledger.delete_quota(id).await.map_err(strato_types::StratoError::from)?;
    state.storage.delete_quota(id).await?;
    Ok(Json(super::DeleteResponse { deleted: true }))
}
