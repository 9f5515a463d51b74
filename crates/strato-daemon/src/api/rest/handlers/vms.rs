//! VM lifecycle endpoints. Thin over `strato_coordinator::Coordinator`:
//! the only work done here is resolving a project's `ProjectContext` (the
//! Coordinator does not own hierarchy storage, per §4.8) and translating
//! requests/responses.

use crate::api::rest::auth::AuthedUser;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use strato_coordinator::{CreateVmRequest as CoordinatorCreateVmRequest, ProjectContext};
use strato_types::{ProjectId, SchedulingStrategyKind, StratoResult, Vm, VmId, VmSpec};

async fn project_context(state: &AppState, project_id: ProjectId) -> StratoResult<ProjectContext> {
    let project = state.storage.get_project(project_id).await?;
    let ous = state.storage.list_ous_by_organization(project.organization_id).await?;
    Ok(ProjectContext::from_project(&project, &ous))
}

#[derive(Debug, Deserialize)]
pub struct CreateVmRequest {
    pub name: String,
    pub environment: String,
    pub requested_cpu: u32,
    pub requested_memory: u64,
    pub requested_disk: u64,
    #[serde(default)]
    pub requires_kvm: bool,
    #[serde(default)]
    pub requires_hvf: bool,
    pub scheduling_strategy: Option<SchedulingStrategyKind>,
}

pub async fn create_vm(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(project_id): Path<ProjectId>,
    Json(request): Json<CreateVmRequest>,
) -> ApiResult<Json<Vm>> {
    let ctx = project_context(&state, project_id).await?;
    let req = CoordinatorCreateVmRequest {
        name: request.name,
        owner: caller.id,
        environment: request.environment,
        spec: VmSpec {
            requested: strato_types::Resources::new(request.requested_cpu, request.requested_memory, request.requested_disk),
            requires_kvm: request.requires_kvm,
            requires_hvf: request.requires_hvf,
        },
        scheduling_strategy: request.scheduling_strategy,
    };
    let vm = state
        .coordinator
        .create_vm(&caller.id.to_string(), &ctx, req)
        .await?;
    tracing::info!(vm_id = %vm.id, project_id = %project_id, "created vm");
    Ok(Json(vm))
}

pub async fn get_vm(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(id): Path<VmId>,
) -> ApiResult<Json<Vm>> {
    Ok(Json(state.storage.get(id).await?))
}

pub async fn list_vms(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(project_id): Path<ProjectId>,
) -> ApiResult<Json<Vec<Vm>>> {
    Ok(Json(state.storage.list_vms_by_project(project_id).await?))
}

macro_rules! control_endpoint {
    ($name:ident, $method:ident) => {
        pub async fn $name(
            State(state): State<AppState>,
            AuthedUser(caller): AuthedUser,
            Path(id): Path<VmId>,
        ) -> ApiResult<Json<Vm>> {
            let vm = state.coordinator.$method(&caller.id.to_string(), id).await?;
            Ok(Json(vm))
        }
    };
}

control_endpoint!(start_vm, start_vm);
control_endpoint!(stop_vm, stop_vm);
control_endpoint!(pause_vm, pause_vm);
control_endpoint!(resume_vm, resume_vm);
control_endpoint!(restart_vm, restart_vm);

pub async fn delete_vm(
    State(state): State<AppState>,
    AuthedUser(caller): AuthedUser,
    Path(id): Path<VmId>,
) -> ApiResult<Json<super::DeleteResponse>> {
    state.coordinator.delete_vm(&caller.id.to_string(), id).await?;
    tracing::info!(vm_id = %id, "deleted vm");
    Ok(Json(super::DeleteResponse { deleted: true }))
}
