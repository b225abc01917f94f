//! Handshake forwarding and connection confirmation inside a room.

use crate::model::{ClientId, ClientState, RelayMessage, Result, RoomId, SignalingError};
use crate::session::{ConnectionRegistry, RoomTable};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// This member confirmed, the peer has not yet.
    Pending,
    /// Both members confirmed; the pairing timer is disarmed.
    RoomConnected(RoomId),
}

/// Forwards `message` unmodified to the other member of the sender's room.
/// Returns the recipient.
#[instrument(skip(registry, rooms, message), fields(kind = message.kind()))]
pub fn forward(
    registry: &mut ConnectionRegistry,
    rooms: &RoomTable,
    id: ClientId,
    message: RelayMessage,
) -> Result<ClientId> {
    let (room_id, peer) = peer_in_room(registry, rooms, id)?;
    registry.send(peer, message.into())?;
    debug!(%room_id, to = ?peer, "Message relayed");
    Ok(peer)
}

/// Marks `id` as connected; once both members are, the room is confirmed.
#[instrument(skip(registry, rooms))]
pub fn confirm(
    registry: &mut ConnectionRegistry,
    rooms: &mut RoomTable,
    id: ClientId,
) -> Result<Confirmation> {
    let room_id = match registry.state(id)? {
        ClientState::Pairing { room_id } => room_id,
        ClientState::Connected { .. } => return Err(SignalingError::AlreadyConfirmed(id)),
        ClientState::Idle | ClientState::Waiting => return Err(SignalingError::StaleRoom(None)),
    };
    let (_, peer) = peer_in_room(registry, rooms, id)?;

    registry.set_state(
        id,
        ClientState::Connected {
            room_id: room_id.clone(),
        },
    )?;

    if !matches!(registry.state(peer)?, ClientState::Connected { .. }) {
        debug!(%room_id, "Waiting for peer confirmation");
        return Ok(Confirmation::Pending);
    }

    if let Some(room) = rooms.get_mut(&room_id) {
        room.disarm();
    }
    info!(%room_id, "Room connected");
    Ok(Confirmation::RoomConnected(room_id))
}

fn peer_in_room(
    registry: &ConnectionRegistry,
    rooms: &RoomTable,
    id: ClientId,
) -> Result<(RoomId, ClientId)> {
    let room_id = registry
        .get(id)?
        .room_id()
        .cloned()
        .ok_or(SignalingError::StaleRoom(None))?;
    let peer = rooms
        .get(&room_id)
        .and_then(|room| room.peer_of(id))
        .ok_or_else(|| SignalingError::StaleRoom(Some(room_id.clone())))?;
    Ok((room_id, peer))
}
