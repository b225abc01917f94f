use crate::model::RoomId;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tracing::{debug, instrument};

/// Cancellable countdown that reports an unconfirmed room back to the
/// supervisor.
///
/// Consumed by [`PairingTimer::cancel`]; an expiry that was already queued
/// when the timer got cancelled is filtered out by the supervisor.
#[derive(Debug)]
pub struct PairingTimer {
    room_id: RoomId,
    handle: AbortHandle,
}

impl PairingTimer {
    #[instrument(skip(expirations))]
    pub fn arm(room_id: RoomId, timeout: Duration, expirations: UnboundedSender<RoomId>) -> Self {
        let expired_room = room_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            debug!(room_id = %expired_room, "Pairing timer fired");
            // The supervisor may already be gone during shutdown.
            let _ = expirations.send(expired_room);
        });

        debug!("Pairing timer armed");
        PairingTimer {
            room_id,
            handle: task.abort_handle(),
        }
    }

    /// Disarms the timer. Aborting a task that already finished is a no-op.
    pub fn cancel(self) {
        debug!(room_id = %self.room_id, "Pairing timer cancelled");
        self.handle.abort();
    }
}
