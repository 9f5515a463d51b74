//! Organizational Unit CRUD and moves (§3/§9).
//!
//! `parent` is the tagged sum `Organization(id) | OrganizationalUnit(id)`;
//! `path`/`depth` are recomputed from the resolved parent on every create
//! and move rather than trusted from the request body.

use crate::api::rest::auth::AuthedUser;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use crate::storage::Storage;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use strato_oracle::Permission;
use strato_types::{MaterializedPath, OrganizationId, OrganizationalUnit, OuId, Parent, StratoError, StratoResult};

use super::{require_permission, DeleteResponse};

/// Resolves a tagged parent pointer to the owning organization and the
/// materialized path the new child should extend. Shared by OU creation,
/// OU moves, and project creation — every hierarchy entity hangs off the
/// same two parent shapes.
pub(crate) async fn resolve_parent(storage: &dyn Storage, parent: Parent) -> StratoResult<(OrganizationId, MaterializedPath)> {
    match parent {
        Parent::Organization(org_id) => {
            storage.get_organization(org_id).await?;
            Ok((org_id, MaterializedPath::root(org_id)))
        }
        Parent::OrganizationalUnit(ou_id) => {
            let ou = storage.get_ou(ou_id).await?;
            Ok((ou.organization_id, ou.path.clone()))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOuRequest {
    pub name: String,
    pub parent: Parent,
}

pub async fn create_ou(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(organization_id): Path<OrganizationId>,
    Json(request): Json<CreateOuRequest>,
) -> ApiResult<Json<OrganizationalUnit>> {
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::CreateOu,
        &organization_id.to_string(),
    )
    .await?;

    let (resolved_org, parent_path) = resolve_parent(state.storage.as_ref(), request.parent).await?;
    if resolved_org != organization_id {
        return Err(StratoError::BadRequest("parent does not belong to the requested organization".into()).into());
    }

    let id = OuId::new();
    let ou = OrganizationalUnit {
        id,
        organization_id,
        name: request.name,
        parent: request.parent,
        path: parent_path.child(id.as_uuid()),
    };
    state.storage.create_ou(&ou).await?;
    tracing::info!(ou_id = %ou.id, organization_id = %organization_id, "created organizational unit");
    Ok(Json(ou))
}

pub async fn get_ou(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(id): Path<OuId>,
) -> ApiResult<Json<OrganizationalUnit>> {
    Ok(Json(state.storage.get_ou(id).await?))
}

pub async fn list_ous(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(organization_id): Path<OrganizationId>,
) -> ApiResult<Json<Vec<OrganizationalUnit>>> {
    Ok(Json(state.storage.list_ous_by_organization(organization_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct MoveOuRequest {
    pub new_parent: Parent,
}

/// Moves an OU to a new parent, recomputing `path`/`depth` atomically with
/// a cycle check: the new parent's path must not already contain this
/// unit's own id (§9).
pub async fn move_ou(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<OuId>,
    Json(request): Json<MoveOuRequest>,
) -> ApiResult<Json<OrganizationalUnit>> {
    let mut ou = state.storage.get_ou(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageOrganization,
        &ou.organization_id.to_string(),
    )
    .await?;

    let (resolved_org, new_parent_path) = resolve_parent(state.storage.as_ref(), request.new_parent).await?;
    if resolved_org != ou.organization_id {
        return Err(StratoError::BadRequest("cannot move an OU across organizations".into()).into());
    }
    if ou.would_cycle(&new_parent_path) {
        return Err(StratoError::Conflict("move would create a cycle in the OU hierarchy".into()).into());
    }

    ou.parent = request.new_parent;
    ou.path = new_parent_path.child(ou.id.as_uuid());
    state.storage.update_ou(&ou).await?;
    tracing::info!(ou_id = %ou.id, "moved organizational unit");
    Ok(Json(ou))
}

pub async fn delete_ou(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<OuId>,
) -> ApiResult<Json<DeleteResponse>> {
    let ou = state.storage.get_ou(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageOrganization,
        &ou.organization_id.to_string(),
    )
    .await?;
    state.storage.delete_ou(id).await?;
    tracing::info!(ou_id = %id, "deleted organizational unit");
    Ok(Json(DeleteResponse { deleted: true }))
}
