use crate::model::{Client, ClientId, ClientState, OutboundEvent, Result, SignalingError};
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tracing::{debug, instrument, warn};

/// Every live connection and its session state.
///
/// Owned by the supervisor task; a record is only ever replaced whole, so no
/// reader can see a state without its room link.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<ClientId, Client>,
    overflowed: Vec<ClientId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            overflowed: Vec::new(),
        }
    }

    #[instrument(skip(self, sender))]
    pub fn register(
        &mut self,
        id: ClientId,
        sender: Sender<OutboundEvent>,
    ) -> Result<()> {
        if self.clients.contains_key(&id) {
            return Err(SignalingError::DuplicateClient(id));
        }
        self.clients.insert(id, Client::new(id, sender));
        debug!(client_count = self.clients.len(), "Client registered");
        Ok(())
    }

    pub fn get(&self, id: ClientId) -> Result<&Client> {
        self.clients.get(&id).ok_or(SignalingError::NotFound(id))
    }

    pub fn state(&self, id: ClientId) -> Result<ClientState> {
        self.get(id).map(|client| client.state.clone())
    }

    /// Replaces the state of `id` and returns the previous one.
    #[instrument(skip(self))]
    pub fn set_state(&mut self, id: ClientId, state: ClientState) -> Result<ClientState> {
        let client = self
            .clients
            .get_mut(&id)
            .ok_or(SignalingError::NotFound(id))?;
        debug!(from = %client.state, to = %state, "State transition");
        Ok(std::mem::replace(&mut client.state, state))
    }

    #[instrument(skip(self))]
    pub fn remove(&mut self, id: ClientId) -> Result<Client> {
        let client = self
            .clients
            .remove(&id)
            .ok_or(SignalingError::NotFound(id))?;
        debug!(prior_state = %client.state, client_count = self.clients.len(), "Client removed");
        Ok(client)
    }

    /// Queues `event` for `id` without waiting. A client whose queue is full
    /// is recorded for eviction, see [`ConnectionRegistry::take_overflowed`].
    pub fn send(&mut self, id: ClientId, event: OutboundEvent) -> Result<()> {
        match self.get(id)?.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(SignalingError::ChannelClosed(id)),
            Err(TrySendError::Full(_)) => {
                if !self.overflowed.contains(&id) {
                    warn!(client_id = ?id, "Outbound queue full");
                    self.overflowed.push(id);
                }
                Err(SignalingError::SlowConsumer(id))
            }
        }
    }

    /// Clients that could not keep up since the last call.
    pub fn take_overflowed(&mut self) -> Vec<ClientId> {
        std::mem::take(&mut self.overflowed)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }
}
