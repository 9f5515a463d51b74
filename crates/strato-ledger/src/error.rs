use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("quota exceeded in scope chain")]
    QuotaExceeded,

    #[error("reservation {0} not found")]
    ReservationNotFound(uuid::Uuid),

    #[error("quota {0} not found")]
    QuotaNotFound(strato_types::QuotaId),

    #[error("lowering max below current reservations is rejected")]
    WouldViolateReservation,

    #[error("cannot delete a quota with outstanding reservations")]
    HasOutstandingReservations,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<LedgerError> for strato_types::StratoError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::QuotaExceeded => strato_types::StratoError::QuotaExceeded,
            LedgerError::ReservationNotFound(_) | LedgerError::QuotaNotFound(_) => {
                strato_types::StratoError::NotFound(e.to_string())
            }
            LedgerError::WouldViolateReservation | LedgerError::HasOutstandingReservations => {
                strato_types::StratoError::Conflict(e.to_string())
            }
        }
    }
}
