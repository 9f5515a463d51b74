//! Background liveness sweeper: flips `online -> offline` for any agent
//! whose last heartbeat is older than the configured window. Runs on the
//! same `tokio::spawn`-interval shape as the Ledger's TTL sweeper.

use crate::registry::AgentRegistry;
use chrono::{Duration, Utc};
use std::sync::Arc;
use strato_types::AgentStatus;

pub struct LivenessSweeper {
    registry: Arc<dyn AgentRegistry>,
    liveness_window: Duration,
    interval: std::time::Duration,
}

impl LivenessSweeper {
    pub fn new(registry: Arc<dyn AgentRegistry>, liveness_window: Duration, interval: std::time::Duration) -> Self {
        Self {
            registry,
            liveness_window,
            interval,
        }
    }

    /// Spawns the sweeper as a long-lived task; returns its handle so the
    /// daemon can hold (and eventually abort) it alongside its other
    /// background tasks.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                self.sweep_once().await;
            }
        })
    }

    async fn sweep_once(&self) {
        let now = Utc::now();
        let snapshot = self.registry.snapshot().await;
        for agent in snapshot.agents {
            if agent.status != AgentStatus::Online {
                continue;
            }
            let stale = agent
                .last_heartbeat
                .map(|hb| now - hb > self.liveness_window)
                .unwrap_or(true);
            if stale {
                tracing::info!(agent_id = %agent.id, "liveness window exceeded, marking offline");
                if let Err(e) = self.registry.mark_offline(agent.id).await {
                    tracing::warn!(agent_id = %agent.id, error = %e, "failed to mark agent offline");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryAgentRegistry;
    use crate::registry::RegisterRequest;
    use std::collections::BTreeSet;
    use strato_types::{AgentId, CertificateSerial, Resources};

    #[tokio::test]
    async fn stale_agent_is_marked_offline() {
        let registry: Arc<dyn AgentRegistry> = Arc::new(InMemoryAgentRegistry::new());
        let agent_id = AgentId::new();
        registry
            .register(
                agent_id,
                RegisterRequest {
                    name: "a".into(),
                    hostname: "h".into(),
                    version: "1".into(),
                    capabilities: BTreeSet::new(),
                    total: Resources::new(4, 4, 4),
                    certificate_serial: CertificateSerial(1),
                },
            )
            .await
            .unwrap();
        let stale_time = Utc::now() - Duration::seconds(120);
        registry
            .heartbeat(agent_id, Resources::new(4, 4, 4), 0, stale_time)
            .await
            .unwrap();

        let sweeper = LivenessSweeper::new(registry.clone(), Duration::seconds(60), std::time::Duration::from_millis(10));
        sweeper.sweep_once().await;

        let agent = registry.get(agent_id).await.unwrap();
        assert_eq!(agent.status, AgentStatus::Offline);
    }
}
