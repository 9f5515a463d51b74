//! Agent inspection (§4.3). Agents are onboarded exclusively through
//! enrollment (`handlers::enrollment`); this module is read-only plus the
//! one administrative escape hatch, forced drain/offline.

use crate::api::rest::auth::{AdminUser, AuthedUser};
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    Json,
};
use strato_types::{Agent, AgentId, StratoError};

pub async fn get_agent(
    State(state): State<AppState>,
    AuthedUser(_caller): AuthedUser,
    Path(id): Path<AgentId>,
) -> ApiResult<Json<Agent>> {
    Ok(Json(state.registry.get(id).await.map_err(StratoError::from)?))
}

/// Serves from the live Registry snapshot, not the persisted mirror —
/// callers asking "what agents exist" want current availability, not the
/// last-written-to-storage view.
pub async fn list_agents(State(state): State<AppState>, AuthedUser(_caller): AuthedUser) -> ApiResult<Json<Vec<Agent>>> {
    let snapshot = state.registry.snapshot().await;
    Ok(Json(snapshot.agents))
}

/// Forces an agent offline in the Registry ahead of the liveness sweeper,
/// e.g. for a planned maintenance drain. Does not touch the agent's
/// websocket channel or in-flight VMs; an operator pairs this with moving
/// workloads off the agent through the ordinary VM control endpoints.
pub async fn mark_offline(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<AgentId>,
) -> ApiResult<Json<Agent>> {
    state.registry.mark_offline(id).await.map_err(StratoError::from)?;
    let agent = state.registry.get(id).await.map_err(StratoError::from)?;
    state.storage.upsert_agent(&agent).await?;
    tracing::info!(agent_id = %id, "agent forced offline");
    Ok(Json(agent))
}
