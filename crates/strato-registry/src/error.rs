use strato_types::AgentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("reservation would drive {dimension} negative on agent {agent}")]
    InsufficientAvailable { agent: AgentId, dimension: &'static str },

    #[error("reservation would exceed total {dimension} on agent {agent}")]
    ExceedsTotal { agent: AgentId, dimension: &'static str },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl From<RegistryError> for strato_types::StratoError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AgentNotFound(id) => {
                strato_types::StratoError::NotFound(format!("agent {id}"))
            }
            RegistryError::InsufficientAvailable { .. } | RegistryError::ExceedsTotal { .. } => {
                strato_types::StratoError::InsufficientCapacity
            }
        }
    }
}
