use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no agents registered")]
    NoAgents,

    #[error("no eligible agent: filtered set empty after capacity/capability filter")]
    NoEligibleAgent,

    #[error("insufficient capacity across {candidates} candidate agent(s)")]
    InsufficientCapacity { candidates: usize },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

impl From<SchedulerError> for strato_types::StratoError {
    fn from(e: SchedulerError) -> Self {
        match e {
            SchedulerError::NoAgents => strato_types::StratoError::NoAgents,
            SchedulerError::NoEligibleAgent => strato_types::StratoError::NoEligibleAgent,
            SchedulerError::InsufficientCapacity { .. } => strato_types::StratoError::InsufficientCapacity,
        }
    }
}
