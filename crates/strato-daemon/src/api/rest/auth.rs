//! Bearer API-key authentication. Keys look like `sk_<32 random bytes, hex>`;
//! only a blake3 digest of the key is ever persisted (§10.2), so
//! authenticating means hashing the presented key and looking up the digest.

use crate::api::rest::state::AppState;
use crate::error::ApiError;
use axum::{extract::FromRequestParts, http::request::Parts};
use strato_types::{StratoError, User};

pub const API_KEY_PREFIX: &str = "sk_";

pub fn digest(key: &str) -> [u8; 32] {
    blake3::hash(key.as_bytes()).into()
}

/// An authenticated caller, extracted from the `Authorization: Bearer sk_…`
/// header. Handlers that take this as a parameter are implicitly
/// authenticated; handlers that don't stay open (enrollment bootstrap, CA
/// trust bundle, health checks).
pub struct AuthedUser(pub User);

impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError(StratoError::PermissionDenied))?;

        let key = header
            .strip_prefix("Bearer ")
            .filter(|k| k.starts_with(API_KEY_PREFIX))
            .ok_or_else(|| ApiError(StratoError::PermissionDenied))?;

        let record = state
            .storage
            .find_by_digest(&digest(key))
            .await?
            .filter(|k| !k.revoked)
            .ok_or_else(|| ApiError(StratoError::PermissionDenied))?;

        let user = state.storage.get_user(record.user_id).await?;
        Ok(AuthedUser(user))
    }
}

/// A caller who must additionally be a system administrator — used by the
/// enrollment/token-minting and organization-creation endpoints.
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthedUser(user) = AuthedUser::from_request_parts(parts, state).await?;
        if !user.is_system_admin {
            return Err(ApiError(StratoError::PermissionDenied));
        }
        Ok(AdminUser(user))
    }
}
