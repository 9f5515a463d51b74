//! Project CRUD and environment management (§3/§9).

use crate::api::rest::auth::AuthedUser;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use strato_oracle::Permission;
use strato_types::{OrganizationId, Parent, Project, ProjectId, StratoError};

use super::ous::resolve_parent;
use super::{require_permission, DeleteResponse};

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub parent: Parent,
    pub default_environment: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(organization_id): Path<OrganizationId>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Json<Project>> {
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::CreateResources,
        &organization_id.to_string(),
    )
    .await?;

    let (resolved_org, parent_path) = resolve_parent(state.storage.as_ref(), request.parent).await?;
    if resolved_org != organization_id {
        return Err(StratoError::BadRequest("parent does not belong to the requested organization".into()).into());
    }

    let id = ProjectId::new();
    let project = Project::new(
        id,
        organization_id,
        request.name,
        request.parent,
        parent_path.child(id.as_uuid()),
        request.default_environment,
    );
    state.storage.create_project(&project).await?;
    tracing::info!(project_id = %project.id, organization_id = %organization_id, "created project");
    Ok(Json(project))
}

pub async fn get_project(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<ProjectId>,
) -> ApiResult<Json<Project>> {
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ViewProject,
        &id.to_string(),
    )
    .await?;
    Ok(Json(state.storage.get_project(id).await?))
}

pub async fn list_projects(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(organization_id): Path<OrganizationId>,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.storage.list_projects_by_organization(organization_id).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<ProjectId>,
) -> ApiResult<Json<DeleteResponse>> {
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageProject,
        &id.to_string(),
    )
    .await?;
    state.storage.delete_project(id).await?;
    tracing::info!(project_id = %id, "deleted project");
    Ok(Json(DeleteResponse { deleted: true }))
}

#[derive(Debug, Deserialize)]
pub struct AddEnvironmentRequest {
    pub name: String,
}

/// Declares a new environment name on the project. Environment-scoped
/// quotas are created separately against `QuotaScope::Project` with this
/// name (§4.6); declaring the environment here only makes it a legal
/// target for VM creation.
pub async fn add_environment(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<ProjectId>,
    Json(request): Json<AddEnvironmentRequest>,
) -> ApiResult<Json<Project>> {
    let mut project = state.storage.get_project(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageEnvironments,
        &project.id.to_string(),
    )
    .await?;
    project.environments.insert(request.name);
    state.storage.update_project(&project).await?;
    Ok(Json(project))
}

#[derive(Debug, Deserialize)]
pub struct RemoveEnvironmentRequest {
    pub name: String,
}

pub async fn remove_environment(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<ProjectId>,
    Json(request): Json<RemoveEnvironmentRequest>,
) -> ApiResult<Json<Project>> {
    let mut project = state.storage.get_project(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageEnvironments,
        &project.id.to_string(),
    )
    .await?;
    project.remove_environment(&request.name)?;
    state.storage.update_project(&project).await?;
    Ok(Json(project))
}

#[derive(Debug, Deserialize)]
pub struct SetDefaultEnvironmentRequest {
    pub name: String,
}

pub async fn set_default_environment(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<ProjectId>,
    Json(request): Json<SetDefaultEnvironmentRequest>,
) -> ApiResult<Json<Project>> {
    let mut project = state.storage.get_project(id).await?;
    require_permission(
        state.oracle.as_ref(),
        &caller.id.to_string(),
        Permission::ManageEnvironments,
        &project.id.to_string(),
    )
    .await?;
    if !project.has_environment(&request.name) {
        return Err(StratoError::BadRequest(format!("environment {:?} is not declared on this project", request.name)).into());
    }
    project.default_environment = request.name;
    state.storage.update_project(&project).await?;
    Ok(Json(project))
}
