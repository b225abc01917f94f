use crate::model::{ClientId, ClientState, OutboundEvent, Result, RoomId};
use crate::session::{ConnectionRegistry, PairingTimer, Room};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument};

/// Result of a readiness signal.
#[derive(Debug)]
pub enum PairingOutcome {
    /// The client now occupies the waiting slot.
    Queued,
    /// Nothing changed: the client was already waiting.
    Unchanged,
    /// A room was formed with the previous waiting client.
    Paired(Room),
}

/// Owns the single waiting slot and forms rooms out of it.
#[derive(Debug)]
pub struct Matchmaker {
    waiting: Option<ClientId>,
    sequence: u64,
    pairing_timeout: Duration,
    expirations: UnboundedSender<RoomId>,
}

impl Matchmaker {
    pub fn new(pairing_timeout: Duration, expirations: UnboundedSender<RoomId>) -> Self {
        Self {
            waiting: None,
            sequence: 0,
            pairing_timeout,
            expirations,
        }
    }

    pub fn waiting(&self) -> Option<ClientId> {
        self.waiting
    }

    /// Places `id` in the waiting slot or pairs it with the current occupant.
    ///
    /// The occupant is re-validated against the registry in the same step
    /// that moves both clients to `pairing`; a stale occupant is replaced.
    /// The caller must make sure `id` is not in a room.
    #[instrument(skip(self, registry))]
    pub fn request_pairing(
        &mut self,
        registry: &mut ConnectionRegistry,
        id: ClientId,
    ) -> Result<PairingOutcome> {
        let state = registry.state(id)?;
        debug_assert!(
            state.room_id().is_none(),
            "client {} asked for pairing while {}",
            id,
            state
        );

        let peer = match self.waiting {
            Some(peer) if peer == id => {
                debug!("Client re-announced readiness while waiting");
                return Ok(PairingOutcome::Unchanged);
            }
            Some(peer) if Self::is_eligible(registry, peer) => peer,
            stale => {
                if let Some(stale) = stale {
                    debug!(?stale, "Replacing stale waiting client");
                }
                registry.set_state(id, ClientState::Waiting)?;
                self.waiting = Some(id);
                info!(client_id = ?id, "Waiting for a partner");
                return Ok(PairingOutcome::Queued);
            }
        };

        let room_id = self.next_room_id();
        let pairing = ClientState::Pairing {
            room_id: room_id.clone(),
        };
        registry.set_state(peer, pairing.clone())?;
        registry.set_state(id, pairing)?;
        self.waiting = None;

        let mut room = Room::new(room_id.clone(), peer, id);
        room.set_timer(PairingTimer::arm(
            room_id.clone(),
            self.pairing_timeout,
            self.expirations.clone(),
        ));

        for member in room.members {
            if let Err(e) = registry.send(
                member,
                OutboundEvent::Paired {
                    room_id: room_id.clone(),
                },
            ) {
                debug!(error = %e, "Could not notify member of pairing");
            }
        }

        info!(%room_id, first = ?peer, second = ?id, "Clients paired");
        Ok(PairingOutcome::Paired(room))
    }

    /// Clears the waiting slot if `id` holds it.
    pub fn withdraw(&mut self, id: ClientId) -> bool {
        if self.waiting == Some(id) {
            self.waiting = None;
            debug!(client_id = ?id, "Waiting slot cleared");
            true
        } else {
            false
        }
    }

    fn is_eligible(registry: &ConnectionRegistry, id: ClientId) -> bool {
        registry
            .get(id)
            .map(|client| client.state.is_waiting())
            .unwrap_or(false)
    }

    fn next_room_id(&mut self) -> RoomId {
        let unix_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        RoomId::new(unix_millis, sequence)
    }
}
