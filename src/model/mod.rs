mod client;
mod error;
mod event;
mod room;

pub use client::{Client, ClientId, ClientState};
pub use error::{Result, SignalingError};
pub use event::{IceCandidate, InboundEvent, OutboundEvent, RelayMessage, SessionDescription};
pub use room::RoomId;
