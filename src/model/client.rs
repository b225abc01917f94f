use crate::model::{OutboundEvent, RoomId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;
use uuid::Uuid;

pub type ClientId = Uuid;

/// Session state of a connected client.
///
/// The room link lives inside the state, so a waiting or idle client can
/// never carry a room id and every transition swaps both at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ClientState {
    Idle,
    Waiting,
    Pairing {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
    Connected {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
}

impl ClientState {
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            ClientState::Pairing { room_id } | ClientState::Connected { room_id } => Some(room_id),
            ClientState::Idle | ClientState::Waiting => None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self, ClientState::Waiting)
    }

    pub fn is_pairing(&self) -> bool {
        matches!(self, ClientState::Pairing { .. })
    }
}

impl Default for ClientState {
    fn default() -> Self {
        ClientState::Idle
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientState::Idle => write!(f, "idle"),
            ClientState::Waiting => write!(f, "waiting"),
            ClientState::Pairing { room_id } => write!(f, "pairing({})", room_id),
            ClientState::Connected { room_id } => write!(f, "connected({})", room_id),
        }
    }
}

/// Registry record for one live connection.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,
    pub state: ClientState,
    pub sender: Sender<OutboundEvent>,
    pub connected_at: Instant,
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.state == other.state
    }
}

impl Client {
    pub fn new(id: ClientId, sender: Sender<OutboundEvent>) -> Self {
        Client {
            id,
            state: ClientState::Idle,
            sender,
            connected_at: Instant::now(),
        }
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.state.room_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::channel;

    #[test]
    fn test_room_id_only_for_paired_states() {
        let room_id = RoomId::from("room_1_0");
        assert_eq!(ClientState::Idle.room_id(), None);
        assert_eq!(ClientState::Waiting.room_id(), None);
        assert_eq!(
            ClientState::Pairing {
                room_id: room_id.clone()
            }
            .room_id(),
            Some(&room_id)
        );
        assert_eq!(
            ClientState::Connected {
                room_id: room_id.clone()
            }
            .room_id(),
            Some(&room_id)
        );
    }

    #[test]
    fn test_new_client_is_idle() {
        let (tx, _rx) = channel(1);
        let client = Client::new(ClientId::new_v4(), tx);
        assert_eq!(client.state, ClientState::Idle);
        assert!(client.room_id().is_none());
    }

    #[test]
    fn test_serialize_state() {
        let state = ClientState::Pairing {
            room_id: RoomId::from("room_42_7"),
        };
        let serialized = serde_json::to_string(&state).unwrap();
        assert_eq!(serialized, r#"{"state":"pairing","roomId":"room_42_7"}"#);
    }
}
