//! Agent Channel (§4.4): persistent bidirectional message transport per
//! connected agent, multiplexing correlated requests and async events.

#![deny(unsafe_code)]

pub mod channel;
pub mod error;
pub mod map;
pub mod wire;

pub use channel::{ack_reply, error_reply, AgentChannel, DEFAULT_OUTBOUND_CAPACITY};
pub use error::{ChannelError, Result};
pub use map::ChannelMap;
pub use wire::{CommandPayload, EventPayload, HeartbeatPayload, RegisterPayload, ReplyError, ReplyPayload, ReplyStatus, WireMessage, WireResources};
