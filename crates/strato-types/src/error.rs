//! The `StratoError` taxonomy (§7). Every component's own narrower error
//! enum (`SchedulerError`, `LedgerError`, `RegistryError`, `ChannelError`,
//! `CaError`, `OracleError`) converts into this one via `#[from]` so call
//! sites keep precise internal errors while the HTTP boundary collapses
//! everything to one of these kinds.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StratoError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("no agents registered")]
    NoAgents,

    #[error("no agent has sufficient capacity")]
    InsufficientCapacity,

    #[error("no eligible agent")]
    NoEligibleAgent,

    #[error("scheduling contention exceeded retry budget")]
    SchedulingContention,

    #[error("agent channel is busy")]
    AgentBusy,

    #[error("agent is disconnected")]
    AgentDisconnected,

    #[error("request timed out")]
    Timeout,

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("certificate authority unavailable")]
    CaUnavailable,

    #[error("permission store unavailable")]
    PermissionStoreUnavailable,

    #[error("persistence unavailable")]
    PersistenceUnavailable,

    #[error("internal error (correlation id {correlation_id})")]
    Internal {
        correlation_id: Uuid,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StratoError {
    pub fn internal<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let correlation_id = Uuid::new_v4();
        tracing_internal(correlation_id, &source);
        Self::Internal {
            correlation_id,
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StratoError::BadRequest(_) => "bad_request",
            StratoError::PermissionDenied => "permission_denied",
            StratoError::NotFound(_) => "not_found",
            StratoError::Conflict(_) => "conflict",
            StratoError::QuotaExceeded => "quota_exceeded",
            StratoError::NoAgents => "no_agents",
            StratoError::InsufficientCapacity => "insufficient_capacity",
            StratoError::NoEligibleAgent => "no_eligible_agent",
            StratoError::SchedulingContention => "scheduling_contention",
            StratoError::AgentBusy => "agent_busy",
            StratoError::AgentDisconnected => "agent_disconnected",
            StratoError::Timeout => "timeout",
            StratoError::InvalidStateTransition { .. } => "invalid_state_transition",
            StratoError::CaUnavailable => "ca_unavailable",
            StratoError::PermissionStoreUnavailable => "permission_store_unavailable",
            StratoError::PersistenceUnavailable => "persistence_unavailable",
            StratoError::Internal { .. } => "internal",
        }
    }
}

fn tracing_internal(correlation_id: Uuid, source: &dyn std::error::Error) {
    // Kept as a free function so `StratoError::internal` stays usable from
    // crates that do not otherwise depend on `tracing` macros at the call
    // site; the dependency itself is still pulled in by `strato-types`.
    tracing::error!(%correlation_id, error = %source, "internal error");
}

pub type StratoResult<T> = std::result::Result<T, StratoError>;
