//! Admin-only certificate operations (§10.5): forced revocation outside
//! the normal enrollment/rotation flow, for an operator responding to a
//! compromised or decommissioned agent. Not part of the tenant-facing
//! hierarchy CRUD surface — `AdminUser`-gated like organization creation.

use crate::api::rest::auth::AdminUser;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use strato_types::{CertificateSerial, StratoError};

#[derive(Debug, Deserialize)]
pub struct RevokeCertificateRequest {
    pub certificate_serial: String,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "operator-initiated revocation".to_string()
}

#[derive(Debug, Serialize)]
pub struct RevokeCertificateResponse {
    pub revoked: bool,
}

fn parse_serial(hex: &str) -> ApiResult<CertificateSerial> {
    u128::from_str_radix(hex, 16)
        .map(CertificateSerial)
        .map_err(|_| ApiError(StratoError::BadRequest(format!("invalid certificate serial: {hex}"))))
}

pub async fn revoke_certificate(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<RevokeCertificateRequest>,
) -> ApiResult<Json<RevokeCertificateResponse>> {
    let serial = parse_serial(&request.certificate_serial)?;

    state.ca.revoke_certificate(serial, request.reason.clone()).map_err(StratoError::from)?;
    state.storage.mark_revoked(serial, &request.reason, chrono::Utc::now()).await?;

    if let Some(record) = state.ca.lookup(serial) {
        if let Ok(agent_id) = record.subject_agent_id.parse() {
            if let Some(channel) = state.channels.get(agent_id) {
                channel.force_close();
            }
        }
    }

    tracing::warn!(%serial, "certificate forcibly revoked by operator");
    Ok(Json(RevokeCertificateResponse { revoked: true }))
}
