//! The agent wire protocol (§6): a persistent, WebSocket-framed transport
//! carrying one JSON message per frame.

use serde::{Deserialize, Serialize};
use strato_types::Resources;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum WireMessage {
    Register {
        id: Option<String>,
        agent_id: String,
        payload: RegisterPayload,
    },
    Heartbeat {
        id: Option<String>,
        agent_id: String,
        payload: HeartbeatPayload,
    },
    Command {
        id: String,
        agent_id: String,
        payload: CommandPayload,
    },
    Reply {
        id: String,
        agent_id: String,
        payload: ReplyPayload,
    },
    Event {
        id: Option<String>,
        agent_id: String,
        payload: EventPayload,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPayload {
    pub capabilities: Vec<String>,
    pub totals: WireResources,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub available: WireResources,
    pub running_vm_count: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResources {
    pub cpu: u32,
    pub memory: i64,
    pub disk: i64,
}

impl From<WireResources> for Resources {
    fn from(r: WireResources) -> Self {
        Resources::new(r.cpu, r.memory.max(0) as u64, r.disk.max(0) as u64)
    }
}

impl From<Resources> for WireResources {
    fn from(r: Resources) -> Self {
        WireResources {
            cpu: r.cpu,
            memory: r.memory as i64,
            disk: r.disk as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPayload {
    pub op: String,
    pub vm: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyError {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub kind: String,
    pub vm_id: String,
    pub details: serde_json::Value,
}
