//! Error surfaces for stratod: `ApiError` maps the shared `StratoError`
//! taxonomy (§7) onto HTTP responses, `DaemonError` maps startup failures
//! onto the process exit codes (§6).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use strato_types::StratoError;
use thiserror::Error;

/// Wraps `StratoError` at the HTTP boundary. Every handler returns
/// `Result<_, ApiError>`; `From<StratoError>` lets `?` do the conversion.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub StratoError);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StratoError::BadRequest(_) => StatusCode::BAD_REQUEST,
            StratoError::PermissionDenied => StatusCode::FORBIDDEN,
            StratoError::NotFound(_) => StatusCode::NOT_FOUND,
            StratoError::Conflict(_) => StatusCode::CONFLICT,
            StratoError::QuotaExceeded => StatusCode::CONFLICT,
            StratoError::NoAgents => StatusCode::SERVICE_UNAVAILABLE,
            StratoError::InsufficientCapacity => StatusCode::CONFLICT,
            StratoError::NoEligibleAgent => StatusCode::CONFLICT,
            StratoError::SchedulingContention => StatusCode::CONFLICT,
            StratoError::AgentBusy => StatusCode::SERVICE_UNAVAILABLE,
            StratoError::AgentDisconnected => StatusCode::SERVICE_UNAVAILABLE,
            StratoError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            StratoError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            StratoError::CaUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            StratoError::PermissionStoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            StratoError::PersistenceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            StratoError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.kind(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Startup failures, each carrying the exit code `main` reports on (§6):
/// 1 bad config, 2 CA unavailable, 3 persistence unavailable, 4 permission
/// store unavailable.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("certificate authority unavailable: {0}")]
    Ca(String),

    #[error("persistence unavailable: {0}")]
    Persistence(String),

    #[error("permission store unavailable: {0}")]
    PermissionStore(String),

    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Config(_) => 1,
            DaemonError::Ca(_) => 2,
            DaemonError::Persistence(_) => 3,
            DaemonError::PermissionStore(_) => 4,
            DaemonError::Server(_) | DaemonError::Io(_) => 1,
        }
    }
}

pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = ApiError(StratoError::NotFound("vm x".into()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn permission_denied_maps_to_403() {
        let err = ApiError(StratoError::PermissionDenied);
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn quota_exceeded_maps_to_409() {
        let err = ApiError(StratoError::QuotaExceeded);
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn exit_codes_match_spec() {
        assert_eq!(DaemonError::Config("x".into()).exit_code(), 1);
        assert_eq!(DaemonError::Ca("x".into()).exit_code(), 2);
        assert_eq!(DaemonError::Persistence("x".into()).exit_code(), 3);
        assert_eq!(DaemonError::PermissionStore("x".into()).exit_code(), 4);
    }
}
