//! The Agent Channel's WebSocket transport (§4.4/§6): upgrade, register,
//! then a read loop dispatching `heartbeat`/`reply`/`event` frames while a
//! separate task drains the channel's outbound queue onto the socket.

use crate::api::rest::state::AppState;
use crate::api::tls::PeerIdentity;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use strato_channel::{AgentChannel, WireMessage};
use strato_registry::RegisterRequest;
use strato_types::AgentId;

pub async fn agent_channel(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<PeerIdentity>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

async fn handle_socket(socket: WebSocket, state: AppState, peer: PeerIdentity) {
    let (mut sender, mut receiver) = socket.split();

    let Some(Ok(Message::Text(text))) = receiver.next().await else {
        return;
    };
    let Ok(WireMessage::Register { agent_id, payload, .. }) = serde_json::from_str::<WireMessage>(&text) else {
        tracing::warn!("agent channel opened with no register frame");
        return;
    };
    let Ok(agent_id) = agent_id.parse::<AgentId>() else {
        return;
    };

    let Some(serial) = peer.certificate_serial else {
        tracing::warn!(%agent_id, "agent channel attempt with no client certificate");
        return;
    };
    if !state.ca.validate_for_agent(serial, &agent_id.to_string(), Utc::now()) {
        tracing::warn!(%agent_id, %serial, "agent channel attempt with an invalid or revoked certificate");
        return;
    }

    let hostname = state
        .registry
        .get(agent_id)
        .await
        .map(|a| a.hostname)
        .unwrap_or_else(|_| agent_id.to_string());

    let register = RegisterRequest {
        name: agent_id.to_string(),
        hostname,
        version: payload.version,
        capabilities: payload.capabilities.into_iter().collect(),
        total: payload.totals.into(),
        certificate_serial: serial,
    };
    if let Err(e) = state.registry.register(agent_id, register).await {
        tracing::error!(%agent_id, error = %e, "agent registration failed on channel connect");
        return;
    }
    if let Ok(agent) = state.registry.get(agent_id).await {
        let _ = state.storage.upsert_agent(&agent).await;
    }

    let command_timeout = Duration::from_secs(state.config.server.command_timeout_secs);
    let (channel, mut outbound_rx) = AgentChannel::new(agent_id, command_timeout);
    let channel = Arc::new(channel);
    state.channels.insert(channel.clone());
    tracing::info!(%agent_id, "agent channel established");

    let outbound_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            // Races the next inbound frame against a forced close so a
            // certificate revoked mid-session (§4.4, §8 S6) tears the
            // socket down without waiting on the agent to send anything.
            _ = channel.closed() => {
                tracing::warn!(%agent_id, "channel force-closed, certificate no longer valid");
                break;
            }
            frame = receiver.next() => {
                let Some(Ok(message)) = frame else {
                    break;
                };
                let Message::Text(text) = message else {
                    continue;
                };
                let Ok(wire) = serde_json::from_str::<WireMessage>(&text) else {
                    tracing::trace!(%agent_id, frame = %text, "dropping malformed wire frame");
                    continue;
                };
                dispatch_frame(&state, agent_id, &channel, wire).await;
            }
        }
    }

    outbound_task.abort();
    state.channels.remove(agent_id);
    if let Err(e) = state.registry.mark_offline(agent_id).await {
        tracing::warn!(%agent_id, error = %e, "failed to mark agent offline on disconnect");
    }
    if let Ok(agent) = state.registry.get(agent_id).await {
        let _ = state.storage.upsert_agent(&agent).await;
    }
    tracing::info!(%agent_id, "agent channel closed");
}

async fn dispatch_frame(state: &AppState, agent_id: AgentId, channel: &Arc<AgentChannel>, wire: WireMessage) {
    match wire {
        WireMessage::Heartbeat { payload, .. } => {
            if let Err(e) = state
                .registry
                .heartbeat(agent_id, payload.available.into(), payload.running_vm_count, payload.timestamp)
                .await
            {
                tracing::warn!(%agent_id, error = %e, "heartbeat rejected");
            }
        }
        WireMessage::Reply { id, payload, .. } => {
            channel.resolve_reply(&id, payload);
        }
        WireMessage::Event { payload, .. } => {
            let Ok(vm_id) = payload.vm_id.parse() else {
                tracing::warn!(%agent_id, vm_id = %payload.vm_id, "event frame with unparseable vm id");
                return;
            };
            if let Err(e) = state.coordinator.handle_lifecycle_event(vm_id, &payload.kind).await {
                tracing::warn!(%agent_id, %vm_id, error = %e, "failed to apply lifecycle event");
            }
        }
        // Control plane -> agent only; receiving one back is a protocol
        // violation and is dropped rather than acted on.
        WireMessage::Command { .. } => {}
        // A second register frame mid-session would indicate the agent
        // restarted without reconnecting; nothing to do until it drops
        // the socket and opens a fresh one.
        WireMessage::Register { .. } => {}
    }
}
