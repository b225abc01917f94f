use crate::model::{
    ClientId, ClientState, OutboundEvent, RelayMessage, Result, RoomId, SignalingError,
};
use crate::session::relay::{self, Confirmation};
use crate::session::{
    ClientSnapshot, ConnectionRegistry, Matchmaker, PairingOutcome, RoomSnapshot, RoomTable,
    SessionSnapshot, SupervisorConfig,
};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

/// Commands processed by the supervisor task, in arrival order.
#[derive(Debug)]
pub enum SessionCommand {
    Register {
        client_id: ClientId,
        sender: Sender<OutboundEvent>,
        reply: oneshot::Sender<Result<()>>,
    },
    Ready {
        client_id: ClientId,
    },
    Relay {
        client_id: ClientId,
        message: RelayMessage,
    },
    ConnectionEstablished {
        client_id: ClientId,
    },
    Leave {
        client_id: ClientId,
    },
    ClientState {
        client_id: ClientId,
        reply: oneshot::Sender<Option<ClientState>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

impl SessionCommand {
    pub fn get_type(&self) -> &'static str {
        match self {
            SessionCommand::Register { .. } => "Register",
            SessionCommand::Ready { .. } => "Ready",
            SessionCommand::Relay { .. } => "Relay",
            SessionCommand::ConnectionEstablished { .. } => "ConnectionEstablished",
            SessionCommand::Leave { .. } => "Leave",
            SessionCommand::ClientState { .. } => "ClientState",
            SessionCommand::Snapshot { .. } => "Snapshot",
        }
    }
}

/// Single owner of the registry, the waiting slot and the room table.
///
/// Disconnects travel on their own queue and are always drained before
/// timer expiries and regular commands.
pub struct SessionSupervisor {
    registry: ConnectionRegistry,
    matchmaker: Matchmaker,
    rooms: RoomTable,
    commands: Receiver<SessionCommand>,
    disconnects: UnboundedReceiver<ClientId>,
    expirations: UnboundedReceiver<RoomId>,
}

impl SessionSupervisor {
    /// Starts the supervisor task and returns a handle to it.
    pub fn spawn(config: SupervisorConfig) -> SupervisorHandle {
        let (supervisor, handle) = Self::new(config);
        tokio::spawn(supervisor.run());
        handle
    }

    pub fn new(config: SupervisorConfig) -> (Self, SupervisorHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();
        let (expiration_tx, expiration_rx) = mpsc::unbounded_channel();

        let supervisor = SessionSupervisor {
            registry: ConnectionRegistry::new(),
            matchmaker: Matchmaker::new(config.pairing_timeout, expiration_tx),
            rooms: RoomTable::new(),
            commands: command_rx,
            disconnects: disconnect_rx,
            expirations: expiration_rx,
        };
        let handle = SupervisorHandle {
            commands: command_tx,
            disconnects: disconnect_tx,
            outbound_capacity: config.outbound_capacity,
        };
        (supervisor, handle)
    }

    /// Runs until every [`SupervisorHandle`] is dropped.
    pub async fn run(mut self) {
        info!("Session supervisor started");
        loop {
            tokio::select! {
                biased;
                Some(client_id) = self.disconnects.recv() => {
                    self.handle_disconnect(client_id);
                }
                Some(room_id) = self.expirations.recv() => {
                    self.handle_expiry(room_id);
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
            self.evict_slow_clients();
        }
        info!(
            clients = self.registry.len(),
            rooms = self.rooms.len(),
            "Session supervisor stopped"
        );
    }

    #[instrument(skip(self, command), fields(command_type = command.get_type()))]
    fn handle_command(&mut self, command: SessionCommand) {
        let result = match command {
            SessionCommand::Register {
                client_id,
                sender,
                reply,
            } => {
                let result = self.registry.register(client_id, sender);
                match &result {
                    Ok(()) => info!(?client_id, "Client connected"),
                    Err(e) => warn!(?client_id, error = %e, "Client rejected"),
                }
                let _ = reply.send(result);
                Ok(())
            }
            SessionCommand::Ready { client_id } => self.handle_ready(client_id),
            SessionCommand::Relay { client_id, message } => {
                relay::forward(&mut self.registry, &self.rooms, client_id, message).map(|_| ())
            }
            SessionCommand::ConnectionEstablished { client_id } => {
                relay::confirm(&mut self.registry, &mut self.rooms, client_id).map(
                    |confirmation| {
                        if confirmation == Confirmation::Pending {
                            debug!(?client_id, "Connection confirmed by one side");
                        }
                    },
                )
            }
            SessionCommand::Leave { client_id } => self.handle_leave(client_id),
            SessionCommand::ClientState { client_id, reply } => {
                let _ = reply.send(self.registry.state(client_id).ok());
                Ok(())
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                Ok(())
            }
        };

        if let Err(e) = result {
            if e.is_benign() {
                debug!(error = %e, "Command dropped");
            } else {
                warn!(error = %e, "Command failed");
            }
        }
    }

    #[instrument(skip(self))]
    fn handle_ready(&mut self, client_id: ClientId) -> Result<()> {
        if let Some(room_id) = self.registry.state(client_id)?.room_id().cloned() {
            info!(%room_id, "Client asked for a new partner");
            self.teardown_room(&room_id, Some(client_id), OutboundEvent::PeerDisconnected);
        }

        match self
            .matchmaker
            .request_pairing(&mut self.registry, client_id)?
        {
            PairingOutcome::Paired(room) => self.rooms.insert(room),
            PairingOutcome::Queued | PairingOutcome::Unchanged => {}
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn handle_leave(&mut self, client_id: ClientId) -> Result<()> {
        match self.registry.state(client_id)? {
            ClientState::Waiting => {
                self.matchmaker.withdraw(client_id);
                self.registry.set_state(client_id, ClientState::Idle)?;
                info!("Client left the waiting slot");
            }
            ClientState::Pairing { room_id } | ClientState::Connected { room_id } => {
                self.teardown_room(&room_id, Some(client_id), OutboundEvent::PeerDisconnected);
                info!(%room_id, "Client left the room");
            }
            ClientState::Idle => debug!("Leave from idle client ignored"),
        }
        Ok(())
    }

    /// Removes the client and everything that references it. Never fails.
    #[instrument(skip(self))]
    fn handle_disconnect(&mut self, client_id: ClientId) {
        let client = match self.registry.remove(client_id) {
            Ok(client) => client,
            Err(e) => {
                debug!(error = %e, "Disconnect for unknown client");
                return;
            }
        };

        self.matchmaker.withdraw(client_id);
        if let Some(room_id) = client.room_id() {
            self.teardown_room(room_id, Some(client_id), OutboundEvent::PeerDisconnected);
        }
        info!(prior_state = %client.state, "Client disconnected");
    }

    /// Disconnects every client whose outbound queue overflowed. Tearing down
    /// their rooms can overflow further clients, so this runs to a fixpoint.
    fn evict_slow_clients(&mut self) {
        loop {
            let overflowed = self.registry.take_overflowed();
            if overflowed.is_empty() {
                return;
            }
            for client_id in overflowed {
                warn!(?client_id, "Disconnecting client that stopped reading");
                self.handle_disconnect(client_id);
            }
        }
    }

    #[instrument(skip(self))]
    fn handle_expiry(&mut self, room_id: RoomId) {
        let Some(room) = self.rooms.get_mut(&room_id) else {
            debug!("Expiry for a room that no longer exists");
            return;
        };

        let registry = &self.registry;
        let unconfirmed = room.members.iter().any(|member| {
            registry
                .get(*member)
                .map(|client| client.state.is_pairing())
                .unwrap_or(false)
        });
        if !unconfirmed {
            room.disarm();
            debug!("Expiry for a confirmed room ignored");
            return;
        }

        info!("Pairing timed out");
        self.teardown_room(&room_id, None, OutboundEvent::PairingTimeout);
    }

    /// Destroys `room_id`, returns every remaining member to `idle` and sends
    /// `notice` to all of them except `departing`.
    fn teardown_room(
        &mut self,
        room_id: &RoomId,
        departing: Option<ClientId>,
        notice: OutboundEvent,
    ) {
        let Some(room) = self.rooms.remove(room_id) else {
            warn!(%room_id, "Room already destroyed");
            if let Some(id) = departing {
                if let Ok(state) = self.registry.state(id) {
                    if state.room_id() == Some(room_id) {
                        let _ = self.registry.set_state(id, ClientState::Idle);
                    }
                }
            }
            return;
        };

        for member in room.members {
            if !self.registry.contains(member) {
                continue;
            }
            let _ = self.registry.set_state(member, ClientState::Idle);
            if Some(member) == departing {
                continue;
            }
            if let Err(e) = self.registry.send(member, notice.clone()) {
                debug!(error = %e, "Could not notify room member");
            }
        }
        debug!(%room_id, "Room destroyed");
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            clients: self
                .registry
                .iter()
                .map(|client| ClientSnapshot {
                    id: client.id,
                    state: client.state.clone(),
                    connected_ms: millis(client.connected_at.elapsed()),
                })
                .collect(),
            waiting: self.matchmaker.waiting(),
            rooms: self
                .rooms
                .iter()
                .map(|room| RoomSnapshot {
                    room_id: room.id.clone(),
                    members: room.members,
                    age_ms: millis(room.created_at.elapsed()),
                    timer_armed: room.is_timer_armed(),
                })
                .collect(),
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Cloneable entry point to the supervisor task.
#[derive(Clone, Debug)]
pub struct SupervisorHandle {
    commands: Sender<SessionCommand>,
    disconnects: UnboundedSender<ClientId>,
    outbound_capacity: usize,
}

impl SupervisorHandle {
    /// Capacity for the per-client queue passed to [`SupervisorHandle::register`].
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_capacity
    }

    #[instrument(skip(self, sender))]
    pub async fn register(
        &self,
        client_id: ClientId,
        sender: Sender<OutboundEvent>,
    ) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Register {
            client_id,
            sender,
            reply,
        })
        .await?;
        response
            .await
            .map_err(|_| SignalingError::SupervisorUnavailable)?
    }

    pub async fn ready(&self, client_id: ClientId) -> Result<()> {
        self.send(SessionCommand::Ready { client_id }).await
    }

    pub async fn relay(&self, client_id: ClientId, message: RelayMessage) -> Result<()> {
        self.send(SessionCommand::Relay { client_id, message }).await
    }

    pub async fn connection_established(&self, client_id: ClientId) -> Result<()> {
        self.send(SessionCommand::ConnectionEstablished { client_id })
            .await
    }

    pub async fn leave(&self, client_id: ClientId) -> Result<()> {
        self.send(SessionCommand::Leave { client_id }).await
    }

    /// Queues a disconnect ahead of every pending command. Does not wait.
    pub fn disconnect(&self, client_id: ClientId) -> Result<()> {
        self.disconnects
            .send(client_id)
            .map_err(|_| SignalingError::SupervisorUnavailable)
    }

    pub async fn client_state(&self, client_id: ClientId) -> Result<Option<ClientState>> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::ClientState { client_id, reply })
            .await?;
        response
            .await
            .map_err(|_| SignalingError::SupervisorUnavailable)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        response
            .await
            .map_err(|_| SignalingError::SupervisorUnavailable)
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SignalingError::SupervisorUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionDescription;

    fn connect(supervisor: &mut SessionSupervisor) -> (ClientId, Receiver<OutboundEvent>) {
        let client_id = ClientId::new_v4();
        let (sender, receiver) = mpsc::channel(16);
        let (reply, _response) = oneshot::channel();
        supervisor.handle_command(SessionCommand::Register {
            client_id,
            sender,
            reply,
        });
        (client_id, receiver)
    }

    fn ready(supervisor: &mut SessionSupervisor, client_id: ClientId) {
        supervisor.handle_command(SessionCommand::Ready { client_id });
    }

    fn confirm(supervisor: &mut SessionSupervisor, client_id: ClientId) {
        supervisor.handle_command(SessionCommand::ConnectionEstablished { client_id });
    }

    fn room_of(supervisor: &SessionSupervisor, client_id: ClientId) -> RoomId {
        supervisor
            .registry
            .state(client_id)
            .unwrap()
            .room_id()
            .cloned()
            .unwrap()
    }

    fn drain(receiver: &mut Receiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_register_duplicate_is_rejected() {
        let (mut supervisor, _handle) = SessionSupervisor::new(SupervisorConfig::default());
        let (x, _x_rx) = connect(&mut supervisor);

        let (reply, response) = oneshot::channel();
        supervisor.handle_command(SessionCommand::Register {
            client_id: x,
            sender: mpsc::channel(1).0,
            reply,
        });
        assert!(matches!(
            response.await.unwrap(),
            Err(SignalingError::DuplicateClient(_))
        ));
        assert_eq!(supervisor.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_expiry_after_confirmation_is_ignored() {
        let (mut supervisor, _handle) = SessionSupervisor::new(SupervisorConfig::default());
        let (x, mut x_rx) = connect(&mut supervisor);
        let (y, mut y_rx) = connect(&mut supervisor);
        ready(&mut supervisor, x);
        ready(&mut supervisor, y);
        let room_id = room_of(&supervisor, x);
        confirm(&mut supervisor, x);
        confirm(&mut supervisor, y);
        drain(&mut x_rx);
        drain(&mut y_rx);

        supervisor.handle_expiry(room_id.clone());

        assert!(supervisor.rooms.contains(&room_id));
        assert_eq!(
            supervisor.registry.state(x).unwrap(),
            ClientState::Connected {
                room_id: room_id.clone()
            }
        );
        assert!(drain(&mut x_rx).is_empty());
        assert!(drain(&mut y_rx).is_empty());
    }

    #[tokio::test]
    async fn test_expiry_with_one_side_confirmed_dissolves_room() {
        let (mut supervisor, _handle) = SessionSupervisor::new(SupervisorConfig::default());
        let (x, mut x_rx) = connect(&mut supervisor);
        let (y, mut y_rx) = connect(&mut supervisor);
        ready(&mut supervisor, x);
        ready(&mut supervisor, y);
        let room_id = room_of(&supervisor, x);
        confirm(&mut supervisor, x);
        drain(&mut x_rx);
        drain(&mut y_rx);

        supervisor.handle_expiry(room_id.clone());

        assert!(!supervisor.rooms.contains(&room_id));
        assert_eq!(supervisor.registry.state(x).unwrap(), ClientState::Idle);
        assert_eq!(supervisor.registry.state(y).unwrap(), ClientState::Idle);
        assert_eq!(drain(&mut x_rx), vec![OutboundEvent::PairingTimeout]);
        assert_eq!(drain(&mut y_rx), vec![OutboundEvent::PairingTimeout]);
        assert!(supervisor.snapshot().violations().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_for_destroyed_room_is_noop() {
        let (mut supervisor, _handle) = SessionSupervisor::new(SupervisorConfig::default());
        let (x, _x_rx) = connect(&mut supervisor);
        let (y, mut y_rx) = connect(&mut supervisor);
        ready(&mut supervisor, x);
        ready(&mut supervisor, y);
        let room_id = room_of(&supervisor, x);
        supervisor.handle_disconnect(x);
        drain(&mut y_rx);

        supervisor.handle_expiry(room_id);

        assert_eq!(supervisor.registry.state(y).unwrap(), ClientState::Idle);
        assert!(drain(&mut y_rx).is_empty());
    }

    #[tokio::test]
    async fn test_ready_while_paired_finds_new_partner() {
        let (mut supervisor, _handle) = SessionSupervisor::new(SupervisorConfig::default());
        let (x, mut x_rx) = connect(&mut supervisor);
        let (y, mut y_rx) = connect(&mut supervisor);
        let (z, mut z_rx) = connect(&mut supervisor);
        ready(&mut supervisor, x);
        ready(&mut supervisor, y);
        let first_room = room_of(&supervisor, x);
        ready(&mut supervisor, z);
        drain(&mut x_rx);
        drain(&mut y_rx);

        ready(&mut supervisor, x);

        assert!(!supervisor.rooms.contains(&first_room));
        assert_eq!(drain(&mut y_rx), vec![OutboundEvent::PeerDisconnected]);
        assert_eq!(supervisor.registry.state(y).unwrap(), ClientState::Idle);

        let second_room = room_of(&supervisor, x);
        assert_ne!(first_room, second_room);
        assert_eq!(room_of(&supervisor, z), second_room);
        let paired = OutboundEvent::Paired {
            room_id: second_room,
        };
        assert_eq!(drain(&mut x_rx), vec![paired.clone()]);
        assert_eq!(drain(&mut z_rx), vec![paired]);
        assert!(supervisor.snapshot().violations().is_empty());
    }

    #[tokio::test]
    async fn test_leave_waiting_slot() {
        let (mut supervisor, _handle) = SessionSupervisor::new(SupervisorConfig::default());
        let (x, _x_rx) = connect(&mut supervisor);
        ready(&mut supervisor, x);

        supervisor.handle_command(SessionCommand::Leave { client_id: x });

        assert_eq!(supervisor.matchmaker.waiting(), None);
        assert_eq!(supervisor.registry.state(x).unwrap(), ClientState::Idle);
    }

    #[tokio::test]
    async fn test_leave_room_notifies_peer() {
        let (mut supervisor, _handle) = SessionSupervisor::new(SupervisorConfig::default());
        let (x, mut x_rx) = connect(&mut supervisor);
        let (y, mut y_rx) = connect(&mut supervisor);
        ready(&mut supervisor, x);
        ready(&mut supervisor, y);
        drain(&mut x_rx);
        drain(&mut y_rx);

        supervisor.handle_command(SessionCommand::Leave { client_id: y });

        assert!(supervisor.rooms.is_empty());
        assert_eq!(drain(&mut x_rx), vec![OutboundEvent::PeerDisconnected]);
        assert!(drain(&mut y_rx).is_empty());
        assert_eq!(supervisor.registry.state(x).unwrap(), ClientState::Idle);
        assert_eq!(supervisor.registry.state(y).unwrap(), ClientState::Idle);
    }

    #[tokio::test]
    async fn test_relay_after_teardown_is_dropped() {
        let (mut supervisor, _handle) = SessionSupervisor::new(SupervisorConfig::default());
        let (x, mut x_rx) = connect(&mut supervisor);
        let (y, _y_rx) = connect(&mut supervisor);
        ready(&mut supervisor, x);
        ready(&mut supervisor, y);
        supervisor.handle_disconnect(y);
        drain(&mut x_rx);

        supervisor.handle_command(SessionCommand::Relay {
            client_id: x,
            message: RelayMessage::Offer(SessionDescription::new("v=0")),
        });

        assert!(drain(&mut x_rx).is_empty());
        assert_eq!(supervisor.registry.state(x).unwrap(), ClientState::Idle);
    }

    #[tokio::test]
    async fn test_disconnect_overtakes_queued_commands() {
        let handle = SessionSupervisor::spawn(SupervisorConfig::default());
        let (x, y) = (ClientId::new_v4(), ClientId::new_v4());
        let (x_tx, _x_rx) = mpsc::channel(16);
        let (y_tx, mut y_rx) = mpsc::channel(16);
        handle.register(x, x_tx).await.unwrap();
        handle.register(y, y_tx).await.unwrap();
        handle.ready(x).await.unwrap();
        handle.snapshot().await.unwrap();

        // Y's readiness is queued before X's disconnect, but the disconnect
        // is handled first, so Y ends up waiting instead of paired.
        handle.ready(y).await.unwrap();
        handle.disconnect(x).unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.waiting, Some(y));
        assert_eq!(snapshot.state_of(y), Some(&ClientState::Waiting));
        assert!(snapshot.rooms.is_empty());
        assert!(y_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_dissolves_unconfirmed_room() {
        let handle = SessionSupervisor::spawn(
            SupervisorConfig::default().with_pairing_timeout(Duration::from_secs(10)),
        );
        let (x, y) = (ClientId::new_v4(), ClientId::new_v4());
        let (x_tx, mut x_rx) = mpsc::channel(16);
        let (y_tx, mut y_rx) = mpsc::channel(16);
        handle.register(x, x_tx).await.unwrap();
        handle.register(y, y_tx).await.unwrap();
        handle.ready(x).await.unwrap();
        handle.ready(y).await.unwrap();

        assert!(matches!(x_rx.recv().await, Some(OutboundEvent::Paired { .. })));
        assert!(matches!(y_rx.recv().await, Some(OutboundEvent::Paired { .. })));

        assert_eq!(x_rx.recv().await, Some(OutboundEvent::PairingTimeout));
        assert_eq!(y_rx.recv().await, Some(OutboundEvent::PairingTimeout));

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.rooms.is_empty());
        assert_eq!(snapshot.state_of(x), Some(&ClientState::Idle));
        assert_eq!(snapshot.state_of(y), Some(&ClientState::Idle));
    }

    #[tokio::test]
    async fn test_handle_fails_after_supervisor_stops() {
        let (supervisor, handle) = SessionSupervisor::new(SupervisorConfig::default());
        drop(supervisor);

        assert!(matches!(
            handle.ready(ClientId::nil()).await,
            Err(SignalingError::SupervisorUnavailable)
        ));
        assert!(matches!(
            handle.disconnect(ClientId::nil()),
            Err(SignalingError::SupervisorUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_client_that_stops_reading_is_evicted() {
        let handle = SessionSupervisor::spawn(SupervisorConfig::default());
        let (x, y) = (ClientId::new_v4(), ClientId::new_v4());
        let (x_tx, mut x_rx) = mpsc::channel(16);
        let (y_tx, mut y_rx) = mpsc::channel(1);
        handle.register(x, x_tx).await.unwrap();
        handle.register(y, y_tx).await.unwrap();
        handle.ready(x).await.unwrap();
        handle.ready(y).await.unwrap();
        assert!(matches!(x_rx.recv().await, Some(OutboundEvent::Paired { .. })));

        // Y never reads, so its single slot still holds `paired`.
        handle
            .relay(x, RelayMessage::Offer(SessionDescription::new("v=0")))
            .await
            .unwrap();

        assert_eq!(x_rx.recv().await, Some(OutboundEvent::PeerDisconnected));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state_of(y), None);
        assert_eq!(snapshot.state_of(x), Some(&ClientState::Idle));
        assert!(snapshot.rooms.is_empty());

        assert!(matches!(y_rx.recv().await, Some(OutboundEvent::Paired { .. })));
        assert_eq!(y_rx.recv().await, None);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
