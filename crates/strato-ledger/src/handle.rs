use chrono::{DateTime, Utc};
use strato_types::{QuotaId, Resources};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReservationHandle(pub Uuid);

impl ReservationHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReservationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationState {
    Reserved,
    Committed,
}

#[derive(Debug, Clone)]
pub(crate) struct ReservationRecord {
    pub quota_ids: Vec<QuotaId>,
    pub delta: Resources,
    pub vm_delta: u32,
    pub created_at: DateTime<Utc>,
    pub state: ReservationState,
}
