//! Route table for stratod's HTTP surface (§6): hierarchy/quota/VM CRUD,
//! enrollment, health, and the agent channel upgrade, composed onto one
//! `axum::Router<AppState>` with the codebase's standard `tower-http`
//! middleware stack.

use super::handlers::*;
use super::state::AppState;
use super::ws;
use axum::error_handling::HandleErrorLayer;
use axum::http::{Method, StatusCode};
use axum::{
    routing::{delete, get, patch, post, put},
    BoxError, Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let enable_cors = state.config.server.enable_cors;
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/v1/bootstrap", post(bootstrap_admin))
        .route("/v1/enroll", post(enroll))
        .route("/v1/enroll/join-token", post(mint_join_token))
        .route("/v1/enroll/trust-bundle", get(get_trust_bundle))
        .route("/v1/enroll/crl", get(get_crl))
        .route("/v1/agent-channel", get(ws::agent_channel))
        .route("/v1/users", post(create_user).get(list_users))
        .route("/v1/users/:user_id/api-keys", post(create_api_key))
        .route("/v1/api-keys/:id", delete(revoke_api_key))
        .route("/v1/organizations", post(create_organization).get(list_organizations))
        .route("/v1/organizations/:id", get(get_organization).delete(delete_organization))
        .route(
            "/v1/organizations/:organization_id/ous",
            post(create_ou).get(list_ous),
        )
        .route("/v1/ous/:id", get(get_ou).delete(delete_ou))
        .route("/v1/ous/:id/move", post(move_ou))
        .route(
            "/v1/organizations/:organization_id/projects",
            post(create_project).get(list_projects),
        )
        .route("/v1/projects/:id", get(get_project).delete(delete_project))
        .route("/v1/projects/:id/environments", post(add_environment))
        .route("/v1/projects/:id/environments/remove", post(remove_environment))
        .route("/v1/projects/:id/environments/default", put(set_default_environment))
        .route(
            "/v1/organizations/:organization_id/groups",
            post(create_group).get(list_groups),
        )
        .route("/v1/groups/:id", get(get_group).delete(delete_group))
        .route("/v1/groups/:id/members", post(add_member))
        .route("/v1/groups/:id/members/:user_id", delete(remove_member))
        .route("/v1/quotas", post(create_quota).get(list_quotas))
        .route("/v1/quotas/:id", get(get_quota).delete(delete_quota))
        .route("/v1/quotas/:id/max", patch(update_quota_max))
        .route("/v1/agents", get(list_agents))
        .route("/v1/agents/:id", get(get_agent))
        .route("/v1/agents/:id/offline", post(mark_offline))
        .route("/v1/admin/certificates/revoke", post(revoke_certificate))
        .route("/v1/projects/:project_id/vms", post(create_vm).get(list_vms))
        .route("/v1/vms/:id", get(get_vm).delete(delete_vm))
        .route("/v1/vms/:id/start", post(start_vm))
        .route("/v1/vms/:id/stop", post(stop_vm))
        .route("/v1/vms/:id/pause", post(pause_vm))
        .route("/v1/vms/:id/resume", post(resume_vm))
        .route("/v1/vms/:id/restart", post(restart_vm))
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(timeout_error))
                .timeout(request_timeout),
        )
        .with_state(state);

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(vec![Method::GET, Method::POST, Method::PATCH, Method::PUT, Method::DELETE])
                .allow_headers(Any),
        );
    }

    router
}

async fn timeout_error(err: BoxError) -> StatusCode {
    if err.is::<tower::timeout::error::Elapsed>() {
        StatusCode::REQUEST_TIMEOUT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
