use crate::error::{Result, SchedulerError};
use crate::strategy::{build_strategy, SchedulingStrategy};
use std::collections::HashMap;
use strato_types::{Agent, AgentSnapshot, AgentStatus, SchedulingStrategyKind, VmSpec};

/// Stateless with respect to decisions; per-strategy state (the
/// `round_robin` counter, the `random` RNG) lives inside each built
/// strategy instance, constructed once at scheduler startup.
pub struct Scheduler {
    default_strategy: SchedulingStrategyKind,
    strategies: HashMap<SchedulingStrategyKind, Box<dyn SchedulingStrategy>>,
}

impl Scheduler {
    pub fn new(default_strategy: SchedulingStrategyKind) -> Self {
        let kinds = [
            SchedulingStrategyKind::LeastLoaded,
            SchedulingStrategyKind::BestFit,
            SchedulingStrategyKind::RoundRobin,
            SchedulingStrategyKind::Random,
        ];
        let strategies = kinds.into_iter().map(|k| (k, build_strategy(k))).collect();
        Self {
            default_strategy,
            strategies,
        }
    }

    /// `SelectAgent(vm, snapshot, strategyOverride?)` from §4.7.
    pub fn select_agent(
        &self,
        vm: &VmSpec,
        snapshot: &AgentSnapshot,
        strategy_override: Option<SchedulingStrategyKind>,
    ) -> Result<strato_types::AgentId> {
        if snapshot.agents.is_empty() {
            return Err(SchedulerError::NoAgents);
        }

        let mut candidates: Vec<Agent> = snapshot
            .agents
            .iter()
            .filter(|a| a.status == AgentStatus::Online)
            .filter(|a| a.available.covers(&vm.requested))
            .filter(|a| !vm.requires_kvm || a.has_capability("kvm"))
            .filter(|a| !vm.requires_hvf || a.has_capability("hvf"))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Err(SchedulerError::NoEligibleAgent);
        }

        candidates.sort_by(|a, b| a.id.as_uuid().cmp(&b.id.as_uuid()));

        let kind = strategy_override.unwrap_or(self.default_strategy);
        let strategy = self
            .strategies
            .get(&kind)
            .expect("all four strategy kinds are constructed in new()");

        strategy
            .select(&candidates, vm)
            .map(|a| a.id)
            .ok_or(SchedulerError::InsufficientCapacity {
                candidates: candidates.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use strato_types::{AgentId, Resources};

    fn agent(name: &str, available: Resources, total: Resources, online: bool) -> Agent {
        let mut a = Agent::new(AgentId::new(), name, format!("{name}.local"), "1.0.0", BTreeSet::new(), total);
        a.available = available;
        a.status = if online {
            AgentStatus::Online
        } else {
            AgentStatus::Offline
        };
        a
    }

    fn vm(requested: Resources) -> VmSpec {
        VmSpec {
            requested,
            requires_kvm: false,
            requires_hvf: false,
        }
    }

    #[test]
    fn least_loaded_picks_the_agent_with_lowest_overall_utilization() {
        let busy = agent("busy", Resources::new(1, 1024, 1024), Resources::new(10, 10240, 10240), true);
        let idle = agent("idle", Resources::new(9, 9216, 9216), Resources::new(10, 10240, 10240), true);
        let snapshot = AgentSnapshot {
            agents: vec![busy, idle.clone()],
        };
        let scheduler = Scheduler::new(SchedulingStrategyKind::LeastLoaded);
        let chosen = scheduler
            .select_agent(&vm(Resources::new(1, 1024, 1024)), &snapshot, None)
            .unwrap();
        assert_eq!(chosen, idle.id);
    }

    #[test]
    fn offline_agents_are_never_eligible() {
        let offline = agent("off", Resources::new(10, 10240, 10240), Resources::new(10, 10240, 10240), false);
        let snapshot = AgentSnapshot { agents: vec![offline] };
        let scheduler = Scheduler::new(SchedulingStrategyKind::LeastLoaded);
        let err = scheduler
            .select_agent(&vm(Resources::new(1, 1, 1)), &snapshot, None)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NoEligibleAgent));
    }

    #[test]
    fn insufficient_capacity_is_distinguished_from_no_agents() {
        let scheduler = Scheduler::new(SchedulingStrategyKind::LeastLoaded);
        let empty = AgentSnapshot { agents: vec![] };
        assert!(matches!(
            scheduler.select_agent(&vm(Resources::new(1, 1, 1)), &empty, None),
            Err(SchedulerError::NoAgents)
        ));

        let tiny = agent("tiny", Resources::new(1, 1, 1), Resources::new(1, 1, 1), true);
        let snapshot = AgentSnapshot { agents: vec![tiny] };
        assert!(matches!(
            scheduler.select_agent(&vm(Resources::new(4, 4, 4)), &snapshot, None),
            Err(SchedulerError::NoEligibleAgent)
        ));
    }

    #[test]
    fn missing_capability_excludes_an_otherwise_eligible_agent() {
        let mut a = agent("a", Resources::new(10, 10240, 10240), Resources::new(10, 10240, 10240), true);
        a.capabilities.insert("hvf".to_string());
        let snapshot = AgentSnapshot { agents: vec![a] };
        let scheduler = Scheduler::new(SchedulingStrategyKind::LeastLoaded);
        let mut spec = vm(Resources::new(1, 1, 1));
        spec.requires_kvm = true;
        let err = scheduler.select_agent(&spec, &snapshot, None).unwrap_err();
        assert!(matches!(err, SchedulerError::NoEligibleAgent));
    }

    #[test]
    fn round_robin_advances_across_calls() {
        let a1 = agent("a1", Resources::new(10, 10240, 10240), Resources::new(10, 10240, 10240), true);
        let a2 = agent("a2", Resources::new(10, 10240, 10240), Resources::new(10, 10240, 10240), true);
        let (first_id, second_id) = (a1.id, a2.id);
        let mut ordered = vec![a1, a2];
        ordered.sort_by_key(|a| a.id.as_uuid());
        let snapshot = AgentSnapshot { agents: ordered };
        let scheduler = Scheduler::new(SchedulingStrategyKind::RoundRobin);
        let spec = vm(Resources::new(1, 1, 1));

        let picks: Vec<AgentId> = (0..4)
            .map(|_| scheduler.select_agent(&spec, &snapshot, None).unwrap())
            .collect();
        assert_eq!(picks[0], picks[2]);
        assert_eq!(picks[1], picks[3]);
        assert_ne!(picks[0], picks[1]);
        assert!(picks.iter().all(|p| *p == first_id || *p == second_id));
    }
}
