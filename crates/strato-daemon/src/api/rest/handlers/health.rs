//! Liveness and readiness probes (§6/§10.1) — the ambient operational
//! surface every long-running service in this codebase exposes alongside
//! its domain API.

use crate::api::rest::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime: String,
}

/// Always `200 healthy` once the process is serving requests; readiness,
/// not liveness of downstream dependencies, is `readyz`'s job.
pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub agents_connected: usize,
}

/// Ready once the channel map exists (it always does once this handler is
/// reachable) and at least reports the current connected-agent count;
/// persistence/oracle reachability surface as request-time errors rather
/// than a separate dependency probe here.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let body = ReadyResponse {
        ready: true,
        agents_connected: state.channels.len(),
    };
    (StatusCode::OK, Json(body))
}
