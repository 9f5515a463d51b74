use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaError {
    #[error("failed to load or initialize root key material: {0}")]
    RootKeyUnavailable(String),

    #[error("invalid CSR: {0}")]
    InvalidCsr(String),

    #[error("public key already bound to an active certificate for a different agent")]
    KeyReuse,

    #[error("certificate serial {0} not found")]
    SerialNotFound(String),

    #[error("certificate signing failed: {0}")]
    SigningFailed(String),

    #[error("CSR subject {csr_subject} does not match expected subject {expected}")]
    SubjectMismatch { csr_subject: String, expected: String },
}

pub type Result<T> = std::result::Result<T, CaError>;

impl From<CaError> for strato_types::StratoError {
    fn from(e: CaError) -> Self {
        match e {
            CaError::RootKeyUnavailable(_) | CaError::SigningFailed(_) => {
                strato_types::StratoError::CaUnavailable
            }
            CaError::InvalidCsr(msg) => strato_types::StratoError::BadRequest(msg),
            CaError::KeyReuse => {
                strato_types::StratoError::Conflict("public key already in use".into())
            }
            CaError::SerialNotFound(s) => {
                strato_types::StratoError::NotFound(format!("certificate {s}"))
            }
            CaError::SubjectMismatch { .. } => strato_types::StratoError::BadRequest(e.to_string()),
        }
    }
}
