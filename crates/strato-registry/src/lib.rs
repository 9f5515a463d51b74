//! Agent Registry (§4.3): live inventory of agents, capacity, and
//! liveness, plus the background sweeper that retires stale agents.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod registry;
pub mod sweeper;

pub use error::{RegistryError, Result};
pub use memory::InMemoryAgentRegistry;
pub use registry::{AgentRegistry, RegisterRequest};
pub use sweeper::LivenessSweeper;
