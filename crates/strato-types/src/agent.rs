//! The hypervisor agent as the control plane sees it.

use crate::ids::{AgentId, CertificateSerial};
use crate::resources::Resources;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Connecting,
    Online,
    Offline,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub hostname: String,
    pub version: String,
    pub capabilities: BTreeSet<String>,
    pub total: Resources,
    pub available: Resources,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub status: AgentStatus,
    pub running_vm_count: u32,
    /// Serial of the certificate currently binding this agent's channel.
    pub certificate_serial: Option<CertificateSerial>,
}

impl Agent {
    pub fn new(
        id: AgentId,
        name: impl Into<String>,
        hostname: impl Into<String>,
        version: impl Into<String>,
        capabilities: BTreeSet<String>,
        total: Resources,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            hostname: hostname.into(),
            version: version.into(),
            capabilities,
            total,
            available: total,
            last_heartbeat: None,
            status: AgentStatus::Connecting,
            running_vm_count: 0,
            certificate_serial: None,
        }
    }

    pub fn is_online(&self, now: DateTime<Utc>, liveness_window: chrono::Duration) -> bool {
        self.status == AgentStatus::Online
            && self
                .last_heartbeat
                .is_some_and(|hb| now - hb <= liveness_window)
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.contains(cap)
    }

    /// Utilization as defined by the `least_loaded` scheduling strategy:
    /// `1 - available/total`, `0` if total is `0`.
    pub fn cpu_utilization(&self) -> f64 {
        utilization(self.available.cpu as f64, self.total.cpu as f64)
    }

    pub fn memory_utilization(&self) -> f64 {
        utilization(self.available.memory as f64, self.total.memory as f64)
    }

    pub fn disk_utilization(&self) -> f64 {
        utilization(self.available.disk as f64, self.total.disk as f64)
    }
}

fn utilization(available: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        1.0 - available / total
    }
}

/// An immutable, independently-consistent-per-agent view handed to the
/// Scheduler. Taking this is the Registry's `Snapshot()` operation.
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub agents: Vec<Agent>,
}
