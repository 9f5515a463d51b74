use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("invalid join token")]
    InvalidToken,

    #[error("join token expired")]
    TokenExpired,

    #[error("join token already used")]
    TokenAlreadyUsed,

    #[error("CSR subject {csr_subject} does not match token agent {token_agent}")]
    SubjectMismatch {
        csr_subject: String,
        token_agent: String,
    },

    #[error("certificate authority unavailable: {0}")]
    CaUnavailable(#[from] strato_ca::CaError),
}

pub type Result<T> = std::result::Result<T, EnrollmentError>;

impl From<EnrollmentError> for strato_types::StratoError {
    fn from(e: EnrollmentError) -> Self {
        match e {
            EnrollmentError::InvalidToken
            | EnrollmentError::TokenExpired
            | EnrollmentError::TokenAlreadyUsed
            | EnrollmentError::SubjectMismatch { .. } => {
                strato_types::StratoError::BadRequest(e.to_string())
            }
            EnrollmentError::CaUnavailable(_) => strato_types::StratoError::CaUnavailable,
        }
    }
}
