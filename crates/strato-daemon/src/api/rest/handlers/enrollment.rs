//! Enrollment HTTP endpoints (§6): minting join tokens, redeeming them
//! against a CSR, and publishing the trust bundle/CRL an agent needs to
//! validate the control plane in return.

use crate::api::rest::auth::AdminUser;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strato_enrollment::EnrollmentMetadata;
use strato_registry::RegisterRequest;
use strato_types::{AgentId, Certificate, CertificateStatus, StratoError};

#[derive(Debug, Deserialize)]
pub struct MintJoinTokenRequest {
    pub agent_id: AgentId,
    pub ttl_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct MintJoinTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn mint_join_token(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<MintJoinTokenRequest>,
) -> ApiResult<Json<MintJoinTokenResponse>> {
    let (token, expires_at) = state
        .enrollment
        .mint_join_token(request.agent_id, Duration::seconds(request.ttl_secs));

    tracing::info!(agent_id = %request.agent_id, "minted join token");
    Ok(Json(MintJoinTokenResponse { token, expires_at }))
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub token: String,
    pub csr_pem: String,
    pub metadata: EnrollRequestMetadata,
}

#[derive(Debug, Deserialize)]
pub struct EnrollRequestMetadata {
    pub hostname: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub total_cpu: u32,
    pub total_memory: u64,
    pub total_disk: u64,
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub certificate_pem: String,
    pub trust_bundle_pem: String,
}

/// Redeems a join token against a CSR: issues a certificate, then upserts
/// the Agent record as `connecting` with resources from the reported
/// metadata — the Agent Channel's register handshake refreshes this once
/// the agent's websocket actually connects.
pub async fn enroll(State(state): State<AppState>, Json(request): Json<EnrollRequest>) -> ApiResult<Json<EnrollResponse>> {
    let metadata = EnrollmentMetadata {
        hostname: request.metadata.hostname,
        version: request.metadata.version,
        capabilities: request.metadata.capabilities,
        total_cpu: request.metadata.total_cpu,
        total_memory: request.metadata.total_memory,
        total_disk: request.metadata.total_disk,
    };

    let result = state
        .enrollment
        .enroll(&request.token, &request.csr_pem, metadata)
        .map_err(StratoError::from)?;

    let now = Utc::now();
    let cert = Certificate {
        serial: result.certificate_serial,
        subject_agent_id: result.agent_id,
        spiffe_uri: format!("spiffe://{}/agent/{}", state.ca.trust_domain(), result.agent_id),
        issued_at: now,
        not_after: now + Duration::days(state.config.cert_max_validity_days),
        status: CertificateStatus::Active,
        revoked_at: None,
        revocation_reason: None,
    };
    state.storage.insert_certificate(&cert).await?;

    let register = RegisterRequest {
        name: result.agent_id.to_string(),
        hostname: result.metadata.hostname,
        version: result.metadata.version,
        capabilities: result.metadata.capabilities.into_iter().collect(),
        total: strato_types::Resources::new(
            result.metadata.total_cpu,
            result.metadata.total_memory,
            result.metadata.total_disk,
        ),
        certificate_serial: result.certificate_serial,
    };
    state
        .registry
        .register(result.agent_id, register)
        .await
        .map_err(StratoError::from)?;

    let agent = state.registry.get(result.agent_id).await.map_err(StratoError::from)?;
    state.storage.upsert_agent(&agent).await?;

    tracing::info!(agent_id = %result.agent_id, "agent enrolled");

    Ok(Json(EnrollResponse {
        certificate_pem: result.certificate_pem,
        trust_bundle_pem: result.trust_bundle_pem,
    }))
}

#[derive(Debug, Serialize)]
pub struct TrustBundleResponse {
    pub certificate_pem: String,
    pub trust_domain: String,
}

pub async fn get_trust_bundle(State(state): State<AppState>) -> Json<TrustBundleResponse> {
    Json(TrustBundleResponse {
        certificate_pem: state.ca.trust_bundle_pem(),
        trust_domain: state.ca.trust_domain().to_string(),
    })
}

pub async fn get_crl(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let crl_pem = state.ca.generate_crl().map_err(StratoError::from)?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/pkix-crl")], crl_pem))
}
