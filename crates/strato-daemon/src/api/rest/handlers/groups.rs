//! Group CRUD and membership (§3). Groups are a flat, organization-scoped
//! set of users; what a group can *do* is entirely the Authorization
//! Oracle's concern, not modeled here.

use crate::api::rest::auth::AuthedUser;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use strato_oracle::Permission;
use strato_types::{Group, GroupId, OrganizationId, UserId};

use super::{require_permission, DeleteResponse};

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

pub async fn create_group(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(organization_id): Path<OrganizationId>,
    Json(request): Json<CreateGroupRequest>,
) -> ApiResult<Json<Group>> {
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageMembers,
        &organization_id.to_string(),
    )
    .await?;

    let group = Group {
        id: GroupId::new(),
        organization_id,
        name: request.name,
        members: Vec::new(),
    };
    state.storage.create_group(&group).await?;
    tracing::info!(group_id = %group.id, organization_id = %organization_id, "created group");
    Ok(Json(group))
}

pub async fn get_group(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(id): Path<GroupId>,
) -> ApiResult<Json<Group>> {
    Ok(Json(state.storage.get_group(id).await?))
}

pub async fn list_groups(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(organization_id): Path<OrganizationId>,
) -> ApiResult<Json<Vec<Group>>> {
    Ok(Json(state.storage.list_groups_by_organization(organization_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: UserId,
}

pub async fn add_member(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<GroupId>,
    Json(request): Json<AddMemberRequest>,
) -> ApiResult<Json<Group>> {
    let mut group = state.storage.get_group(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageMembers,
        &group.organization_id.to_string(),
    )
    .await?;
    state.storage.get_user(request.user_id).await?;
    if !group.contains(request.user_id) {
        group.members.push(request.user_id);
    }
    state.storage.update_group(&group).await?;
    Ok(Json(group))
}

pub async fn remove_member(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path((id, user_id)): Path<(GroupId, UserId)>,
) -> ApiResult<Json<Group>> {
    let mut group = state.storage.get_group(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageMembers,
        &group.organization_id.to_string(),
    )
    .await?;
    group.members.retain(|m| *m != user_id);
    state.storage.update_group(&group).await?;
    Ok(Json(group))
}

pub async fn delete_group(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<GroupId>,
) -> ApiResult<Json<DeleteResponse>> {
    let group = state.storage.get_group(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageMembers,
        &group.organization_id.to_string(),
    )
    .await?;
    state.storage.delete_group(id).await?;
    tracing::info!(group_id = %id, "deleted group");
    Ok(Json(DeleteResponse { deleted: true }))
}
