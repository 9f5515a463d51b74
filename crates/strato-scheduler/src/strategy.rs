//! Strategy trait plus the four built-in strategies, wired up through a
//! `SchedulingStrategyKind -> Box<dyn SchedulingStrategy>` factory.

use strato_types::{Agent, SchedulingStrategyKind, VmSpec};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Scores a candidate agent for a placement. Lower is better. `None` means
/// the strategy has no opinion (used by `round_robin`/`random`, which pick
/// by position rather than score).
pub trait SchedulingStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, agent: &Agent, vm: &VmSpec) -> Option<f64>;

    /// Picks directly from the already-filtered, agentId-sorted candidate
    /// slice. The default implementation scores and takes the minimum,
    /// tie-breaking on the existing ascending-agentId order; strategies
    /// that pick by position (`round_robin`, `random`) override this.
    fn select<'a>(&self, candidates: &'a [Agent], vm: &VmSpec) -> Option<&'a Agent> {
        candidates
            .iter()
            .filter_map(|a| self.score(a, vm).map(|s| (s, a)))
            .min_by(|(s1, a1), (s2, a2)| {
                s1.partial_cmp(s2)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a1.id.as_uuid().cmp(&a2.id.as_uuid()))
            })
            .map(|(_, a)| a)
    }
}

pub struct LeastLoaded;

impl SchedulingStrategy for LeastLoaded {
    fn name(&self) -> &'static str {
        "least_loaded"
    }

    fn score(&self, agent: &Agent, _vm: &VmSpec) -> Option<f64> {
        Some(0.4 * agent.cpu_utilization() + 0.4 * agent.memory_utilization() + 0.2 * agent.disk_utilization())
    }
}

const GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BEST_FIT_ALPHA: f64 = 1.0;
const BEST_FIT_BETA: f64 = 0.1;

pub struct BestFit;

impl SchedulingStrategy for BestFit {
    fn name(&self) -> &'static str {
        "best_fit"
    }

    fn score(&self, agent: &Agent, vm: &VmSpec) -> Option<f64> {
        let remaining_cpu = agent.available.cpu as f64 - vm.requested.cpu as f64;
        let remaining_mem_gb = (agent.available.memory as f64 - vm.requested.memory as f64) / GB;
        let remaining_disk_gb = (agent.available.disk as f64 - vm.requested.disk as f64) / GB;
        Some(remaining_cpu + BEST_FIT_ALPHA * remaining_mem_gb + BEST_FIT_BETA * remaining_disk_gb)
    }
}

pub struct RoundRobin {
    counter: AtomicU64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingStrategy for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn score(&self, _agent: &Agent, _vm: &VmSpec) -> Option<f64> {
        None
    }

    fn select<'a>(&self, candidates: &'a [Agent], _vm: &VmSpec) -> Option<&'a Agent> {
        if candidates.is_empty() {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) as usize % candidates.len();
        candidates.get(idx)
    }
}

pub struct Random {
    rng: Mutex<rand::rngs::StdRng>,
}

impl Random {
    pub fn new(rng: rand::rngs::StdRng) -> Self {
        Self { rng: Mutex::new(rng) }
    }

    /// Seeds from OS entropy; tests should use `new` with a fixed seed for
    /// reproducibility (§8 S3).
    pub fn from_entropy() -> Self {
        use rand::SeedableRng;
        Self::new(rand::rngs::StdRng::from_entropy())
    }
}

impl SchedulingStrategy for Random {
    fn name(&self) -> &'static str {
        "random"
    }

    fn score(&self, _agent: &Agent, _vm: &VmSpec) -> Option<f64> {
        None
    }

    fn select<'a>(&self, candidates: &'a [Agent], _vm: &VmSpec) -> Option<&'a Agent> {
        if candidates.is_empty() {
            return None;
        }
        use rand::Rng;
        let idx = self.rng.lock().expect("random strategy lock poisoned").gen_range(0..candidates.len());
        candidates.get(idx)
    }
}

pub fn build_strategy(kind: SchedulingStrategyKind) -> Box<dyn SchedulingStrategy> {
    match kind {
        SchedulingStrategyKind::LeastLoaded => Box::new(LeastLoaded),
        SchedulingStrategyKind::BestFit => Box::new(BestFit),
        SchedulingStrategyKind::RoundRobin => Box::new(RoundRobin::new()),
        SchedulingStrategyKind::Random => Box::new(Random::from_entropy()),
    }
}
