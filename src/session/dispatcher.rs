use crate::model::{ClientId, InboundEvent, OutboundEvent, RelayMessage, Result, SignalingError};
use crate::session::SupervisorHandle;
use async_trait::async_trait;
use tokio::sync::mpsc::{self, Receiver};
use tracing::{debug, instrument, warn};

#[async_trait]
pub trait InboundEventHandler: Send + Sync {
    async fn handle_event(&self, event: InboundEvent) -> Result<()>;
}

/// Per-connection bridge from decoded client events to the supervisor.
#[derive(Clone, Debug)]
pub struct EventDispatcher {
    client_id: ClientId,
    supervisor: SupervisorHandle,
}

impl EventDispatcher {
    pub fn new(client_id: ClientId, supervisor: SupervisorHandle) -> Self {
        EventDispatcher {
            client_id,
            supervisor,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Registers the client and returns its bounded outbound queue.
    pub async fn connect(&self) -> Result<Receiver<OutboundEvent>> {
        let (tx, rx) = mpsc::channel(self.supervisor.outbound_capacity());
        self.supervisor.register(self.client_id, tx).await?;
        Ok(rx)
    }

    pub fn disconnect(&self) -> Result<()> {
        self.supervisor.disconnect(self.client_id)
    }

    /// Decodes a text frame and dispatches it. Malformed frames are dropped.
    #[instrument(skip(self, text), fields(client_id = %self.client_id))]
    pub async fn handle_text(&self, text: &str) -> Result<()> {
        match InboundEvent::parse(text) {
            Ok(event) => self.handle_event(event).await,
            Err(SignalingError::InvalidData(e)) => {
                warn!(error = %e, "Dropping malformed event");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl InboundEventHandler for EventDispatcher {
    #[instrument(skip(self, event), fields(client_id = %self.client_id, event_type = event.get_type()))]
    async fn handle_event(&self, event: InboundEvent) -> Result<()> {
        debug!("Dispatching event");
        let client_id = self.client_id;
        match event {
            InboundEvent::Ready => self.supervisor.ready(client_id).await,
            InboundEvent::Offer(description) => {
                self.supervisor
                    .relay(client_id, RelayMessage::Offer(description))
                    .await
            }
            InboundEvent::Answer(description) => {
                self.supervisor
                    .relay(client_id, RelayMessage::Answer(description))
                    .await
            }
            InboundEvent::IceCandidate(candidate) => {
                self.supervisor
                    .relay(client_id, RelayMessage::IceCandidate(candidate))
                    .await
            }
            InboundEvent::ConnectionEstablished => {
                self.supervisor.connection_established(client_id).await
            }
            InboundEvent::Leave => self.supervisor.leave(client_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClientState, SessionDescription};
    use crate::session::{SessionSupervisor, SupervisorConfig};

    async fn connected(supervisor: &SupervisorHandle) -> (EventDispatcher, Receiver<OutboundEvent>) {
        let dispatcher = EventDispatcher::new(ClientId::new_v4(), supervisor.clone());
        let rx = dispatcher.connect().await.unwrap();
        (dispatcher, rx)
    }

    #[tokio::test]
    async fn test_ready_text_pairs_two_clients() {
        let supervisor = SessionSupervisor::spawn(SupervisorConfig::default());
        let (a, mut a_rx) = connected(&supervisor).await;
        let (b, mut b_rx) = connected(&supervisor).await;

        a.handle_text(r#"{"event":"ready"}"#).await.unwrap();
        b.handle_text(r#"{"event":"ready"}"#).await.unwrap();

        let a_paired = a_rx.recv().await.unwrap();
        let b_paired = b_rx.recv().await.unwrap();
        assert!(matches!(a_paired, OutboundEvent::Paired { .. }));
        assert_eq!(a_paired, b_paired);
    }

    #[tokio::test]
    async fn test_offer_event_is_relayed() {
        let supervisor = SessionSupervisor::spawn(SupervisorConfig::default());
        let (a, mut a_rx) = connected(&supervisor).await;
        let (b, mut b_rx) = connected(&supervisor).await;
        a.handle_event(InboundEvent::Ready).await.unwrap();
        b.handle_event(InboundEvent::Ready).await.unwrap();
        a_rx.recv().await.unwrap();
        b_rx.recv().await.unwrap();

        a.handle_event(InboundEvent::Offer(SessionDescription::new("v=0")))
            .await
            .unwrap();

        assert_eq!(
            b_rx.recv().await.unwrap(),
            OutboundEvent::Offer(SessionDescription::new("v=0"))
        );
    }

    #[tokio::test]
    async fn test_malformed_text_is_dropped() {
        let supervisor = SessionSupervisor::spawn(SupervisorConfig::default());
        let (a, _a_rx) = connected(&supervisor).await;

        a.handle_text("not json").await.unwrap();
        a.handle_text(r#"{"event":"offer","data":{}}"#).await.unwrap();

        assert_eq!(
            supervisor.client_state(a.client_id()).await.unwrap(),
            Some(ClientState::Idle)
        );
    }

    #[tokio::test]
    async fn test_disconnect_removes_client() {
        let supervisor = SessionSupervisor::spawn(SupervisorConfig::default());
        let (a, _a_rx) = connected(&supervisor).await;

        a.disconnect().unwrap();

        assert_eq!(supervisor.client_state(a.client_id()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connect_uses_configured_capacity() {
        let supervisor =
            SessionSupervisor::spawn(SupervisorConfig::default().with_outbound_capacity(3));
        let (_a, a_rx) = connected(&supervisor).await;

        assert_eq!(a_rx.max_capacity(), 3);
    }
}
