//! Registry-global map from agent to its open channel. Insert/remove are
//! the only operations requiring map-wide coordination; each channel's own
//! outstanding-request table is independently locked.

use crate::channel::AgentChannel;
use dashmap::DashMap;
use std::sync::Arc;
use strato_types::AgentId;

#[derive(Default)]
pub struct ChannelMap {
    channels: DashMap<AgentId, Arc<AgentChannel>>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing channel for `agent_id` on reconnect,
    /// disconnecting the old one first so its outstanding requests resolve
    /// as `Disconnected` rather than being silently abandoned.
    pub fn insert(&self, channel: Arc<AgentChannel>) {
        let agent_id = channel.agent_id();
        if let Some((_, old)) = self.channels.remove(&agent_id) {
            old.disconnect();
        }
        self.channels.insert(agent_id, channel);
    }

    pub fn get(&self, agent_id: AgentId) -> Option<Arc<AgentChannel>> {
        self.channels.get(&agent_id).map(|e| e.clone())
    }

    pub fn remove(&self, agent_id: AgentId) {
        if let Some((_, channel)) = self.channels.remove(&agent_id) {
            channel.disconnect();
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn reconnect_disconnects_the_previous_channel() {
        let map = ChannelMap::new();
        let agent_id = AgentId::new();
        let (first, _rx1) = AgentChannel::new(agent_id, Duration::from_secs(5));
        let first = Arc::new(first);
        map.insert(first.clone());

        let (second, _rx2) = AgentChannel::new(agent_id, Duration::from_secs(5));
        map.insert(Arc::new(second));

        assert_eq!(map.len(), 1);
        assert_eq!(first.outstanding_count(), 0);
    }
}
