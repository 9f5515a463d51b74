//! API request handlers.

mod agents;
mod certificates;
mod enrollment;
mod groups;
mod health;
mod organizations;
mod ous;
mod projects;
mod quotas;
mod users;
mod vms;

pub use agents::*;
pub use certificates::*;
pub use enrollment::*;
pub use groups::*;
pub use health::*;
pub use organizations::*;
pub use ous::*;
pub use projects::*;
pub use quotas::*;
pub use users::*;
pub use vms::*;

use crate::error::ApiError;
use strato_oracle::{Permission, PermissionOracle};
use strato_types::StratoError;

/// Shared delete-acknowledgement body.
#[derive(Debug, serde::Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Calls the Authorization Oracle and turns a denial into `ApiError`.
/// Handlers that go through the Coordinator get this for free (it does
/// the same check internally); every other CRUD handler calls this
/// directly before touching storage.
pub async fn require_permission(
    oracle: &dyn PermissionOracle,
    subject: &str,
    permission: Permission,
    resource: &str,
) -> Result<(), ApiError> {
    let result = oracle.check(subject, permission, resource).await.map_err(StratoError::from)?;
    if !result.allowed {
        return Err(ApiError(StratoError::PermissionDenied));
    }
    Ok(())
}
