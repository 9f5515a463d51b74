//! The enum naming the four pluggable scheduling strategies. The strategy
//! implementations themselves live in `strato-scheduler`; this enum is here
//! so that both the scheduler crate and the HTTP surface (which accepts
//! `scheduling_strategy` on VM create) can share one wire representation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingStrategyKind {
    LeastLoaded,
    BestFit,
    RoundRobin,
    Random,
}

impl Default for SchedulingStrategyKind {
    fn default() -> Self {
        SchedulingStrategyKind::LeastLoaded
    }
}

impl std::str::FromStr for SchedulingStrategyKind {
    type Err = crate::error::StratoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "least_loaded" => Ok(Self::LeastLoaded),
            "best_fit" => Ok(Self::BestFit),
            "round_robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            other => Err(crate::error::StratoError::BadRequest(format!(
                "unknown scheduling strategy {other:?}"
            ))),
        }
    }
}
