//! `DashMap`-backed implementation of `AgentRegistry`. Per-agent
//! serialization of reserve/unreserve is an explicit `tokio::sync::Mutex`
//! around the three capacity dimensions together, so a read-modify-write
//! across cpu/memory/disk is atomic even though `DashMap` only serializes
//! at the shard level.

use crate::error::{RegistryError, Result};
use crate::registry::{AgentRegistry, RegisterRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use strato_types::{Agent, AgentId, AgentSnapshot, AgentStatus, Resources};
use tokio::sync::Mutex;

struct Entry {
    agent: Mutex<Agent>,
}

pub struct InMemoryAgentRegistry {
    agents: DashMap<AgentId, Arc<Entry>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: DashMap::new(),
        }
    }

    fn entry(&self, agent_id: AgentId) -> Result<Arc<Entry>> {
        self.agents
            .get(&agent_id)
            .map(|e| e.clone())
            .ok_or(RegistryError::AgentNotFound(agent_id))
    }
}

impl Default for InMemoryAgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    async fn register(&self, agent_id: AgentId, req: RegisterRequest) -> Result<()> {
        if let Some(entry) = self.agents.get(&agent_id) {
            let mut agent = entry.agent.lock().await;
            agent.name = req.name;
            agent.hostname = req.hostname;
            agent.version = req.version;
            // Capability set is append-only during a single connection;
            // re-registering on reconnect is a fresh connection, so a
            // shrunk declared set here is accepted as the new truth.
            agent.capabilities = req.capabilities;
            agent.total = req.total;
            agent.certificate_serial = Some(req.certificate_serial);
            agent.status = AgentStatus::Connecting;
            return Ok(());
        }

        let agent = Agent {
            id: agent_id,
            name: req.name,
            hostname: req.hostname,
            version: req.version,
            capabilities: req.capabilities,
            total: req.total,
            available: req.total,
            last_heartbeat: None,
            status: AgentStatus::Connecting,
            running_vm_count: 0,
            certificate_serial: Some(req.certificate_serial),
        };
        self.agents.insert(
            agent_id,
            Arc::new(Entry {
                agent: Mutex::new(agent),
            }),
        );
        Ok(())
    }

    async fn heartbeat(
        &self,
        agent_id: AgentId,
        reported_available: Resources,
        running_vm_count: u32,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let entry = self.entry(agent_id)?;
        let mut agent = entry.agent.lock().await;

        if let Some(last) = agent.last_heartbeat {
            if timestamp < last {
                tracing::debug!(%agent_id, "dropping out-of-order heartbeat");
                return Ok(());
            }
        }

        agent.available = Resources {
            cpu: reported_available.cpu.min(agent.total.cpu),
            memory: reported_available.memory.min(agent.total.memory),
            disk: reported_available.disk.min(agent.total.disk),
        };
        agent.running_vm_count = running_vm_count;
        agent.last_heartbeat = Some(timestamp);
        agent.status = AgentStatus::Online;
        Ok(())
    }

    async fn reserve(&self, agent_id: AgentId, delta: Resources) -> Result<()> {
        let entry = self.entry(agent_id)?;
        let mut agent = entry.agent.lock().await;
        let updated = agent.available.checked_sub(&delta).ok_or_else(|| {
            RegistryError::InsufficientAvailable {
                agent: agent_id,
                dimension: exceeded_dimension(&agent.available, &delta),
            }
        })?;
        agent.available = updated;
        Ok(())
    }

    async fn unreserve(&self, agent_id: AgentId, delta: Resources) -> Result<()> {
        let entry = self.entry(agent_id)?;
        let mut agent = entry.agent.lock().await;
        let updated = agent.available.checked_add(&delta).ok_or_else(|| {
            RegistryError::ExceedsTotal {
                agent: agent_id,
                dimension: "cpu",
            }
        })?;
        if !agent.total.covers(&updated) {
            return Err(RegistryError::ExceedsTotal {
                agent: agent_id,
                dimension: "cpu",
            });
        }
        agent.available = updated;
        Ok(())
    }

    async fn snapshot(&self) -> AgentSnapshot {
        let mut agents = Vec::with_capacity(self.agents.len());
        for entry in self.agents.iter() {
            let agent = entry.value().agent.lock().await;
            agents.push(agent.clone());
        }
        AgentSnapshot { agents }
    }

    async fn mark_offline(&self, agent_id: AgentId) -> Result<()> {
        let entry = self.entry(agent_id)?;
        let mut agent = entry.agent.lock().await;
        agent.status = AgentStatus::Offline;
        Ok(())
    }

    async fn get(&self, agent_id: AgentId) -> Result<Agent> {
        let entry = self.entry(agent_id)?;
        Ok(entry.agent.lock().await.clone())
    }
}

fn exceeded_dimension(available: &Resources, delta: &Resources) -> &'static str {
    if available.cpu < delta.cpu {
        "cpu"
    } else if available.memory < delta.memory {
        "memory"
    } else {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use strato_types::CertificateSerial;

    fn register_req(total: Resources) -> RegisterRequest {
        RegisterRequest {
            name: "a".into(),
            hostname: "h".into(),
            version: "1".into(),
            capabilities: BTreeSet::new(),
            total,
            certificate_serial: CertificateSerial(1),
        }
    }

    #[tokio::test]
    async fn reserve_cannot_drive_available_negative() {
        let registry = InMemoryAgentRegistry::new();
        let agent_id = AgentId::new();
        registry
            .register(agent_id, register_req(Resources::new(4, 4, 4)))
            .await
            .unwrap();

        let err = registry
            .reserve(agent_id, Resources::new(8, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InsufficientAvailable { .. }));
    }

    #[tokio::test]
    async fn unreserve_cannot_exceed_total() {
        let registry = InMemoryAgentRegistry::new();
        let agent_id = AgentId::new();
        registry
            .register(agent_id, register_req(Resources::new(4, 4, 4)))
            .await
            .unwrap();

        let err = registry
            .unreserve(agent_id, Resources::new(1, 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ExceedsTotal { .. }));
    }

    #[tokio::test]
    async fn register_is_idempotent_on_reconnect() {
        let registry = InMemoryAgentRegistry::new();
        let agent_id = AgentId::new();
        registry
            .register(agent_id, register_req(Resources::new(4, 4, 4)))
            .await
            .unwrap();
        registry.reserve(agent_id, Resources::new(2, 0, 0)).await.unwrap();

        registry
            .register(agent_id, register_req(Resources::new(4, 4, 4)))
            .await
            .unwrap();

        // Re-registering does not reset the in-flight reservation.
        let agent = registry.get(agent_id).await.unwrap();
        assert_eq!(agent.available.cpu, 2);
    }

    #[tokio::test]
    async fn out_of_order_heartbeat_is_dropped() {
        let registry = InMemoryAgentRegistry::new();
        let agent_id = AgentId::new();
        registry
            .register(agent_id, register_req(Resources::new(4, 4, 4)))
            .await
            .unwrap();

        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(10);
        registry
            .heartbeat(agent_id, Resources::new(3, 3, 3), 1, later)
            .await
            .unwrap();
        registry
            .heartbeat(agent_id, Resources::new(1, 1, 1), 9, earlier)
            .await
            .unwrap();

        let agent = registry.get(agent_id).await.unwrap();
        assert_eq!(agent.available, Resources::new(3, 3, 3));
    }
}
