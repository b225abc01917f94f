use crate::model::{RoomId, SignalingError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Offer or answer payload. Only `sdp` is required; everything else the
/// browser sends along is carried through untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionDescription {
    pub fn new(sdp: impl Into<String>) -> Self {
        Self {
            sdp: sdp.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            extra: Map::new(),
        }
    }
}

/// Handshake message forwarded verbatim between the two members of a room.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
}

impl RelayMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Offer(_) => "offer",
            RelayMessage::Answer(_) => "answer",
            RelayMessage::IceCandidate(_) => "ice-candidate",
        }
    }
}

/// Events a client sends to the server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum InboundEvent {
    Ready,
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
    ConnectionEstablished,
    Leave,
}

impl InboundEvent {
    pub fn parse(text: &str) -> Result<Self, SignalingError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn get_type(&self) -> &'static str {
        match self {
            InboundEvent::Ready => "ready",
            InboundEvent::Offer(_) => "offer",
            InboundEvent::Answer(_) => "answer",
            InboundEvent::IceCandidate(_) => "ice-candidate",
            InboundEvent::ConnectionEstablished => "connection-established",
            InboundEvent::Leave => "leave",
        }
    }
}

/// Events the server pushes to a client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundEvent {
    Paired {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
    PairingTimeout,
    PeerDisconnected,
}

impl OutboundEvent {
    pub fn to_json(&self) -> Result<String, SignalingError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<RelayMessage> for OutboundEvent {
    fn from(message: RelayMessage) -> Self {
        match message {
            RelayMessage::Offer(description) => OutboundEvent::Offer(description),
            RelayMessage::Answer(description) => OutboundEvent::Answer(description),
            RelayMessage::IceCandidate(candidate) => OutboundEvent::IceCandidate(candidate),
        }
    }
}
