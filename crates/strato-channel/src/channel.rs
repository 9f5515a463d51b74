//! A single agent's channel: an outbound command queue plus the
//! outstanding-request table described in §4.4/§9.

use crate::error::{ChannelError, Result};
use crate::wire::{CommandPayload, ReplyPayload, ReplyStatus, WireMessage};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use strato_types::AgentId;
use tokio::sync::{mpsc, oneshot, Notify};
use uuid::Uuid;

pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

type PendingReply = oneshot::Sender<std::result::Result<ReplyPayload, ChannelError>>;

pub struct AgentChannel {
    agent_id: AgentId,
    outbound_tx: mpsc::Sender<WireMessage>,
    outstanding: DashMap<String, PendingReply>,
    default_timeout: Duration,
    close_signal: Arc<Notify>,
}

impl AgentChannel {
    /// Returns the channel handle plus the receiving half the transport
    /// layer (the daemon's websocket write loop) drains and forwards.
    pub fn new(agent_id: AgentId, default_timeout: Duration) -> (Self, mpsc::Receiver<WireMessage>) {
        let (tx, rx) = mpsc::channel(DEFAULT_OUTBOUND_CAPACITY);
        (
            Self {
                agent_id,
                outbound_tx: tx,
                outstanding: DashMap::new(),
                default_timeout,
                close_signal: Arc::new(Notify::new()),
            },
            rx,
        )
    }

    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Forces the transport layer's read loop to tear down this channel
    /// immediately, e.g. because the certificate binding it was just
    /// revoked (§4.4: "invalidates any open channel presenting that serial
    /// at next validation cycle"). Idempotent; safe to call on an
    /// already-closing channel.
    pub fn force_close(&self) {
        self.close_signal.notify_waiters();
    }

    /// Resolves once `force_close` has been called. The websocket read loop
    /// races this against the next inbound frame so a revoked channel is
    /// torn down without waiting on the agent to send anything.
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }

    /// Sends a `command` frame and awaits its `reply`, bounded by
    /// `timeout` (falls back to the channel's default command timeout).
    #[tracing::instrument(skip(self, payload), fields(agent_id = %self.agent_id))]
    pub async fn send_request(&self, payload: CommandPayload, timeout: Option<Duration>) -> Result<ReplyPayload> {
        let correlation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.outstanding.insert(correlation_id.clone(), tx);

        let message = WireMessage::Command {
            id: correlation_id.clone(),
            agent_id: self.agent_id.to_string(),
            payload,
        };

        if self.outbound_tx.try_send(message).is_err() {
            self.outstanding.remove(&correlation_id);
            tracing::warn!(agent_id = %self.agent_id, "outbound queue full, rejecting request");
            return Err(ChannelError::Busy);
        }

        let wait = timeout.unwrap_or(self.default_timeout);
        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_) => {
                self.outstanding.remove(&correlation_id);
                Err(ChannelError::Timeout)
            }
        }
    }

    /// Called by the transport layer when an inbound `reply` frame
    /// arrives. Looks up and removes the outstanding entry, fulfilling its
    /// sender; a reply with no matching correlation id is logged and
    /// dropped (the requester already timed out or disconnected).
    pub fn resolve_reply(&self, correlation_id: &str, payload: ReplyPayload) {
        if let Some((_, tx)) = self.outstanding.remove(correlation_id) {
            let _ = tx.send(Ok(payload));
        } else {
            tracing::debug!(agent_id = %self.agent_id, correlation_id, "reply for unknown or already-resolved request");
        }
    }

    /// Drains the outstanding-request table, resolving every pending
    /// sender with `Disconnected`. Called once when the channel is torn
    /// down, whether by a clean disconnect or a forced close on
    /// certificate revocation.
    pub fn disconnect(&self) {
        for entry in self.outstanding.iter() {
            tracing::debug!(agent_id = %self.agent_id, correlation_id = %entry.key(), "resolving outstanding request as disconnected");
        }
        self.outstanding.retain(|_, tx| {
            let tx = std::mem::replace(tx, {
                let (discard_tx, _discard_rx) = oneshot::channel();
                discard_tx
            });
            let _ = tx.send(Err(ChannelError::Disconnected));
            false
        });
    }

    /// Fire-and-forget `event` frame, e.g. pushing a configuration update
    /// to the agent. Does not wait for acknowledgement.
    pub fn send_event(&self, message: WireMessage) -> Result<()> {
        self.outbound_tx.try_send(message).map_err(|_| ChannelError::Busy)
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }
}

pub fn ack_reply() -> ReplyPayload {
    ReplyPayload {
        status: ReplyStatus::Ok,
        error: None,
    }
}

pub fn error_reply(kind: impl Into<String>, message: impl Into<String>) -> ReplyPayload {
    ReplyPayload {
        status: ReplyStatus::Error,
        error: Some(crate::wire::ReplyError {
            kind: kind.into(),
            message: message.into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::CommandPayload;

    fn command(op: &str) -> CommandPayload {
        CommandPayload {
            op: op.to_string(),
            vm: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn reply_resolves_the_matching_request() {
        let (channel, mut rx) = AgentChannel::new(AgentId::new(), Duration::from_secs(5));
        let channel = std::sync::Arc::new(channel);
        let c2 = channel.clone();

        let handle = tokio::spawn(async move { c2.send_request(command("create_vm"), None).await });

        let WireMessage::Command { id, .. } = rx.recv().await.unwrap() else {
            panic!("expected a command frame");
        };
        channel.resolve_reply(&id, ack_reply());

        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.status, ReplyStatus::Ok);
    }

    #[tokio::test]
    async fn timeout_retires_the_correlation_id() {
        let (channel, mut rx) = AgentChannel::new(AgentId::new(), Duration::from_millis(20));
        let result = channel.send_request(command("stop"), None).await;
        assert!(matches!(result, Err(ChannelError::Timeout)));
        assert_eq!(channel.outstanding_count(), 0);
        rx.close();
    }

    #[tokio::test]
    async fn disconnect_resolves_all_outstanding_requests() {
        let (channel, mut rx) = AgentChannel::new(AgentId::new(), Duration::from_secs(5));
        let channel = std::sync::Arc::new(channel);
        let c2 = channel.clone();
        let handle = tokio::spawn(async move { c2.send_request(command("start"), None).await });
        let _ = rx.recv().await.unwrap();

        channel.disconnect();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ChannelError::Disconnected)));
    }

    #[tokio::test]
    async fn full_outbound_queue_fails_fast_with_busy() {
        let (channel, mut rx) = AgentChannel::new(AgentId::new(), Duration::from_secs(5));
        for _ in 0..DEFAULT_OUTBOUND_CAPACITY {
            channel.send_event(WireMessage::Event {
                id: None,
                agent_id: channel.agent_id().to_string(),
                payload: crate::wire::EventPayload {
                    kind: "noop".to_string(),
                    vm_id: "x".to_string(),
                    details: serde_json::json!({}),
                },
            }).unwrap();
        }
        let result = channel.send_request(command("create_vm"), None).await;
        assert!(matches!(result, Err(ChannelError::Busy)));
        rx.close();
    }

    #[tokio::test]
    async fn force_close_wakes_a_waiter() {
        let (channel, _rx) = AgentChannel::new(AgentId::new(), Duration::from_secs(5));
        let channel = std::sync::Arc::new(channel);
        let c2 = channel.clone();
        let waiter = tokio::spawn(async move { c2.closed().await });
        tokio::task::yield_now().await;
        channel.force_close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("closed() should resolve after force_close")
            .unwrap();
    }
}
