use crate::model::{ClientId, RoomId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalingError {
    #[error("Client {0} is already registered")]
    DuplicateClient(ClientId),

    #[error("Client {0} not found")]
    NotFound(ClientId),

    #[error("Room {0:?} no longer exists")]
    StaleRoom(Option<RoomId>),

    #[error("Client {0} already confirmed its connection")]
    AlreadyConfirmed(ClientId),

    #[error("Invalid data received: {0}")]
    InvalidData(#[from] serde_json::Error),

    #[error("Channel to client {0} is closed")]
    ChannelClosed(ClientId),

    #[error("Outbound queue of client {0} is full")]
    SlowConsumer(ClientId),

    #[error("Session supervisor is not running")]
    SupervisorUnavailable,
}

impl SignalingError {
    /// Errors caused by a race with teardown rather than a bug or bad input.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            SignalingError::NotFound(_)
                | SignalingError::StaleRoom(_)
                | SignalingError::AlreadyConfirmed(_)
                | SignalingError::ChannelClosed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SignalingError>;
