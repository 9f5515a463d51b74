//! Organization CRUD (§3/§6): the root of the hierarchy. Creation and
//! deletion are system-admin-only — there is no parent resource an
//! authorization check could be framed against yet — while read and
//! rename go through the Oracle's `manage_organization`/`view_organization`
//! permissions like every other hierarchy entity.

use crate::api::rest::auth::{AdminUser, AuthedUser};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use strato_oracle::Permission;
use strato_types::{Organization, OrganizationId};

use super::{require_permission, DeleteResponse};

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_organization(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<CreateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    let org = Organization {
        id: OrganizationId::new(),
        name: request.name,
        description: request.description,
    };
    state.storage.create_organization(&org).await?;
    tracing::info!(organization_id = %org.id, "created organization");
    Ok(Json(org))
}

pub async fn get_organization(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<OrganizationId>,
) -> ApiResult<Json<Organization>> {
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ViewOrganization,
        &id.to_string(),
    )
    .await?;
    Ok(Json(state.storage.get_organization(id).await?))
}

pub async fn list_organizations(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
) -> ApiResult<Json<Vec<Organization>>> {
    Ok(Json(state.storage.list_organizations().await?))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<OrganizationId>,
) -> ApiResult<Json<DeleteResponse>> {
    state.storage.delete_organization(id).await?;
    tracing::info!(organization_id = %id, "deleted organization");
    Ok(Json(DeleteResponse { deleted: true }))
}
