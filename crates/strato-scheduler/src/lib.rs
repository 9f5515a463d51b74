//! Scheduler (§4.7): selects an eligible agent for a VM from a Registry
//! snapshot. Stateless with respect to placement decisions — all state
//! lives in the Registry and the Ledger.

#![deny(unsafe_code)]

pub mod error;
pub mod scheduler;
pub mod strategy;

pub use error::{Result, SchedulerError};
pub use scheduler::Scheduler;
pub use strategy::{build_strategy, BestFit, LeastLoaded, Random, RoundRobin, SchedulingStrategy};
