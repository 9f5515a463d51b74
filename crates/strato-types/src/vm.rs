//! VM lifecycle state, as owned by the control plane (not the agent's local
//! view of a running domain).

use crate::ids::{AgentId, ProjectId, ReservationId, UserId, VmId};
use crate::resources::Resources;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmState {
    Pending,
    Scheduled,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
    Deleted,
}

impl VmState {
    /// The state machine from §4.8: `pending -> scheduled -> starting ->
    /// running <-> stopping -> stopped`, with `running -> failed` and any
    /// terminal state reachable to `deleted`.
    pub fn can_transition_to(self, next: VmState) -> bool {
        use VmState::*;
        if next == Deleted {
            return self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Scheduled, Starting)
                | (Scheduled, Failed)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Running, Failed)
                // restart: a single round trip back to `starting` rather
                // than composing stop+start, which would strand the VM in
                // `Stopping` with no legal path back (§4.8 control ops).
                | (Running, Starting)
                | (Stopping, Running)
                | (Stopping, Stopped)
                | (Stopping, Failed)
                | (Stopped, Starting)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, VmState::Stopped | VmState::Failed | VmState::Deleted)
    }

    /// States for which invariant 3 (§8) requires a live ledger reservation
    /// and registry hold.
    pub fn holds_reservation(self) -> bool {
        matches!(
            self,
            VmState::Scheduled | VmState::Starting | VmState::Running | VmState::Stopping
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSpec {
    pub requested: Resources,
    pub requires_kvm: bool,
    pub requires_hvf: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vm {
    pub id: VmId,
    pub name: String,
    pub owner: UserId,
    pub project_id: ProjectId,
    pub environment: String,
    pub spec: VmSpec,
    pub assigned_agent: Option<AgentId>,
    pub state: VmState,
    pub reservation: Option<ReservationId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vm {
    pub fn transition(&mut self, next: VmState, now: DateTime<Utc>) -> Result<(), crate::error::StratoError> {
        if !self.state.can_transition_to(next) {
            return Err(crate::error::StratoError::InvalidStateTransition {
                from: format!("{:?}", self.state),
                to: format!("{next:?}"),
            });
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_follow_the_lifecycle() {
        assert!(VmState::Pending.can_transition_to(VmState::Scheduled));
        assert!(VmState::Scheduled.can_transition_to(VmState::Starting));
        assert!(VmState::Starting.can_transition_to(VmState::Running));
        assert!(VmState::Running.can_transition_to(VmState::Stopping));
        assert!(VmState::Stopping.can_transition_to(VmState::Running));
        assert!(VmState::Stopping.can_transition_to(VmState::Stopped));
        assert!(VmState::Running.can_transition_to(VmState::Failed));
    }

    #[test]
    fn deleted_is_reachable_from_any_terminal_state() {
        assert!(VmState::Stopped.can_transition_to(VmState::Deleted));
        assert!(VmState::Failed.can_transition_to(VmState::Deleted));
        assert!(!VmState::Running.can_transition_to(VmState::Deleted));
    }

    #[test]
    fn illegal_transition_is_rejected() {
        assert!(!VmState::Pending.can_transition_to(VmState::Running));
        assert!(!VmState::Stopped.can_transition_to(VmState::Scheduled));
    }

    #[test]
    fn restart_is_a_direct_running_to_starting_transition() {
        assert!(VmState::Running.can_transition_to(VmState::Starting));
        // Composing stop (Running -> Stopping) with start would strand the
        // VM with no legal path forward.
        assert!(!VmState::Stopping.can_transition_to(VmState::Starting));
    }

    #[test]
    fn holds_reservation_matches_spec_set() {
        assert!(VmState::Scheduled.holds_reservation());
        assert!(VmState::Starting.holds_reservation());
        assert!(VmState::Running.holds_reservation());
        assert!(VmState::Stopping.holds_reservation());
        assert!(!VmState::Pending.holds_reservation());
        assert!(!VmState::Stopped.holds_reservation());
    }
}
