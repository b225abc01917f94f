use crate::model::{ClientId, ClientState, RoomId};
use serde::Serialize;

/// Point-in-time copy of the supervisor state, for health checks and tests.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub clients: Vec<ClientSnapshot>,
    pub waiting: Option<ClientId>,
    pub rooms: Vec<RoomSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub id: ClientId,
    #[serde(flatten)]
    pub state: ClientState,
    pub connected_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub members: [ClientId; 2],
    pub age_ms: u64,
    pub timer_armed: bool,
}

impl SessionSnapshot {
    pub fn state_of(&self, id: ClientId) -> Option<&ClientState> {
        self.clients
            .iter()
            .find(|client| client.id == id)
            .map(|client| &client.state)
    }

    pub fn room(&self, room_id: &RoomId) -> Option<&RoomSnapshot> {
        self.rooms.iter().find(|room| &room.room_id == room_id)
    }

    /// Describes every broken waiting-slot or room-membership invariant.
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let waiting: Vec<_> = self
            .clients
            .iter()
            .filter(|client| client.state.is_waiting())
            .map(|client| client.id)
            .collect();
        if waiting.len() > 1 {
            violations.push(format!("{} clients in waiting state", waiting.len()));
        }
        match self.waiting {
            Some(occupant) if !waiting.contains(&occupant) => {
                violations.push(format!("waiting occupant {} is not waiting", occupant))
            }
            None if !waiting.is_empty() => {
                violations.push("waiting client without waiting slot".to_string())
            }
            _ => {}
        }

        for room in &self.rooms {
            for member in room.members {
                if self.state_of(member).and_then(ClientState::room_id) != Some(&room.room_id) {
                    violations.push(format!(
                        "member {} does not reference room {}",
                        member, room.room_id
                    ));
                }
            }
        }

        for client in &self.clients {
            if let Some(room_id) = client.state.room_id() {
                let linked = self
                    .room(room_id)
                    .map(|room| room.members.contains(&client.id))
                    .unwrap_or(false);
                if !linked {
                    violations.push(format!(
                        "client {} references stale room {}",
                        client.id, room_id
                    ));
                }
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: u128, state: ClientState) -> ClientSnapshot {
        ClientSnapshot {
            id: ClientId::from_u128(id),
            state,
            connected_ms: 0,
        }
    }

    #[test]
    fn test_consistent_snapshot() {
        let room_id = RoomId::from("room_1_0");
        let snapshot = SessionSnapshot {
            clients: vec![
                client(1, ClientState::Pairing { room_id: room_id.clone() }),
                client(2, ClientState::Connected { room_id: room_id.clone() }),
                client(3, ClientState::Waiting),
                client(4, ClientState::Idle),
            ],
            waiting: Some(ClientId::from_u128(3)),
            rooms: vec![RoomSnapshot {
                room_id,
                members: [ClientId::from_u128(1), ClientId::from_u128(2)],
                age_ms: 5,
                timer_armed: true,
            }],
        };
        assert!(snapshot.violations().is_empty());
    }

    #[test]
    fn test_stale_room_reference() {
        let snapshot = SessionSnapshot {
            clients: vec![client(
                1,
                ClientState::Pairing {
                    room_id: RoomId::from("room_9_9"),
                },
            )],
            waiting: None,
            rooms: vec![],
        };
        assert_eq!(snapshot.violations().len(), 1);
    }

    #[test]
    fn test_waiting_occupant_not_waiting() {
        let snapshot = SessionSnapshot {
            clients: vec![client(1, ClientState::Idle)],
            waiting: Some(ClientId::from_u128(1)),
            rooms: vec![],
        };
        assert_eq!(snapshot.violations().len(), 1);
    }
}
