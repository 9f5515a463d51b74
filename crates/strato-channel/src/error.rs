use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("agent channel is busy")]
    Busy,

    #[error("agent is disconnected")]
    Disconnected,

    #[error("request timed out")]
    Timeout,

    #[error("no channel open for this agent")]
    NoChannel,
}

pub type Result<T> = std::result::Result<T, ChannelError>;

impl From<ChannelError> for strato_types::StratoError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::Busy => strato_types::StratoError::AgentBusy,
            ChannelError::Disconnected | ChannelError::NoChannel => strato_types::StratoError::AgentDisconnected,
            ChannelError::Timeout => strato_types::StratoError::Timeout,
        }
    }
}
