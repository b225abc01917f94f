use crate::model::{ClientId, RoomId};
use crate::session::PairingTimer;
use std::collections::HashMap;
use tokio::time::Instant;

/// Ephemeral pairing of exactly two clients.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub members: [ClientId; 2],
    pub created_at: Instant,
    timer: Option<PairingTimer>,
}

impl Room {
    pub fn new(id: RoomId, first: ClientId, second: ClientId) -> Self {
        Room {
            id,
            members: [first, second],
            created_at: Instant::now(),
            timer: None,
        }
    }

    /// The other member, or `None` when `id` is not part of this room.
    pub fn peer_of(&self, id: ClientId) -> Option<ClientId> {
        match self.members {
            [a, b] if a == id => Some(b),
            [a, b] if b == id => Some(a),
            _ => None,
        }
    }

    pub fn set_timer(&mut self, timer: PairingTimer) {
        if let Some(previous) = self.timer.replace(timer) {
            previous.cancel();
        }
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

impl Drop for Room {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// All live rooms, keyed by id.
#[derive(Debug, Default)]
pub struct RoomTable {
    rooms: HashMap<RoomId, Room>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    pub fn insert(&mut self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    pub fn get(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn get_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    /// Removes the room; dropping it disarms its timer.
    pub fn remove(&mut self, id: &RoomId) -> Option<Room> {
        self.rooms.remove(id)
    }

    pub fn contains(&self, id: &RoomId) -> bool {
        self.rooms.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}
