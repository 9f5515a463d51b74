use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("permission store unavailable: {0}")]
    Unavailable(String),

    #[error("permission store returned an unexpected response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, OracleError>;

impl From<OracleError> for strato_types::StratoError {
    fn from(_: OracleError) -> Self {
        // Transient failures fail closed: never silently treated as allow.
        strato_types::StratoError::PermissionStoreUnavailable
    }
}
