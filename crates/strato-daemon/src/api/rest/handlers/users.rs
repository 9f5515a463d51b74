//! User and API-key management. Not a named component in its own right —
//! `User`/`ApiKey` are data-model entities (§3) the bearer-auth layer
//! (`crate::api::rest::auth`) depends on — so this is the bootstrap and
//! administration surface for both.

use crate::api::rest::auth::{digest, AdminUser, AuthedUser, API_KEY_PREFIX};
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::storage::ApiKey;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use strato_types::{ApiKeyId, StratoError, User, UserId};

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub display_name: String,
    pub is_system_admin: bool,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name,
            is_system_admin: u.is_system_admin,
        }
    }
}

fn generate_api_key() -> (String, [u8; 32]) {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let key = format!("{API_KEY_PREFIX}{}", hex::encode(raw));
    let key_digest = digest(&key);
    (key, key_digest)
}

#[derive(Debug, Serialize)]
pub struct BootstrapResponse {
    pub user: UserResponse,
    pub api_key: String,
}

/// Creates the first system-admin user, provided none exists yet. Open
/// (no bearer auth) because nothing can be authenticated before this call
/// succeeds exactly once; every subsequent call is refused with
/// `Conflict` as soon as any user is on record.
pub async fn bootstrap_admin(State(state): State<AppState>) -> ApiResult<Json<BootstrapResponse>> {
    if !state.storage.list_users().await?.is_empty() {
        return Err(ApiError(StratoError::Conflict(
            "an admin user already exists; bootstrap is single-use".into(),
        )));
    }

    let user = User {
        id: UserId::new(),
        display_name: "admin".to_string(),
        is_system_admin: true,
        created_at: Utc::now(),
    };
    state.storage.create_user(&user).await?;

    let (key, key_digest) = generate_api_key();
    let record = ApiKey {
        id: ApiKeyId::new(),
        user_id: user.id,
        name: "bootstrap".to_string(),
        key_digest,
        created_at: Utc::now(),
        revoked: false,
    };
    state.storage.create_api_key(&record).await?;

    tracing::info!(user_id = %user.id, "bootstrapped first system-admin user");

    Ok(Json(BootstrapResponse {
        user: user.into(),
        api_key: key,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub display_name: String,
    #[serde(default)]
    pub is_system_admin: bool,
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = User {
        id: UserId::new(),
        display_name: request.display_name,
        is_system_admin: request.is_system_admin,
        created_at: Utc::now(),
    };
    state.storage.create_user(&user).await?;
    tracing::info!(user_id = %user.id, "created user");
    Ok(Json(user.into()))
}

pub async fn list_users(State(state): State<AppState>, AuthedUser(_caller): AuthedUser) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.storage.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    pub id: ApiKeyId,
    /// Returned once, at creation time, and never again.
    pub key: String,
}

/// Admin-only: mints a key for any user, including other admins. A
/// self-service "create my own key" endpoint is a reasonable addition but
/// isn't named by the persisted table layout, so it's left out here.
pub async fn create_api_key(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(user_id): Path<UserId>,
    Json(request): Json<CreateApiKeyRequest>,
) -> ApiResult<Json<CreateApiKeyResponse>> {
    state.storage.get_user(user_id).await?;

    let (key, key_digest) = generate_api_key();
    let record = ApiKey {
        id: ApiKeyId::new(),
        user_id,
        name: request.name,
        key_digest,
        created_at: Utc::now(),
        revoked: false,
    };
    state.storage.create_api_key(&record).await?;

    Ok(Json(CreateApiKeyResponse { id: record.id, key }))
}

pub async fn revoke_api_key(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<ApiKeyId>,
) -> ApiResult<Json<super::DeleteResponse>> {
    state.storage.revoke_api_key(id).await?;
    Ok(Json(super::DeleteResponse { deleted: true }))
}
