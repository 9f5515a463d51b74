//! The `AgentRegistry` trait — a seam so the scheduler, channel layer, and
//! HTTP handlers depend on the abstraction rather than a concrete map.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use strato_types::{AgentId, AgentSnapshot, CertificateSerial, Resources};

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub hostname: String,
    pub version: String,
    pub capabilities: BTreeSet<String>,
    pub total: Resources,
    pub certificate_serial: CertificateSerial,
}

#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Idempotent on reconnect: re-registering an already-known agent
    /// refreshes its declared totals/capabilities/certificate without
    /// resetting its current `available` capacity.
    async fn register(&self, agent_id: AgentId, req: RegisterRequest) -> Result<()>;

    /// Updates liveness and available capacity from the agent's own
    /// reported view. Heartbeats observed out of non-decreasing timestamp
    /// order are dropped, not errors.
    async fn heartbeat(
        &self,
        agent_id: AgentId,
        reported_available: Resources,
        running_vm_count: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    /// Adjusts available capacity downward by `delta`; fails if any
    /// dimension would go negative.
    async fn reserve(&self, agent_id: AgentId, delta: Resources) -> Result<()>;

    /// Adjusts available capacity upward by `delta`; fails if any
    /// dimension would exceed the agent's declared total.
    async fn unreserve(&self, agent_id: AgentId, delta: Resources) -> Result<()>;

    /// An internally-consistent-per-agent snapshot for the Scheduler.
    async fn snapshot(&self) -> AgentSnapshot;

    async fn mark_offline(&self, agent_id: AgentId) -> Result<()>;

    async fn get(&self, agent_id: AgentId) -> Result<strato_types::Agent>;
}
