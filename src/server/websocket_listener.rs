use crate::model::{ClientId, OutboundEvent};
use crate::session::{EventDispatcher, SupervisorHandle};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::WebSocketUpgrade;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info, instrument, warn};

pub async fn handle_websocket(
    ws: WebSocketUpgrade,
    supervisor: SupervisorHandle,
) -> impl IntoResponse {
    let client_id = ClientId::new_v4();
    ws.on_upgrade(move |socket| listen(socket, supervisor, client_id))
}

#[instrument(skip(socket, supervisor))]
async fn listen(socket: WebSocket, supervisor: SupervisorHandle, client_id: ClientId) {
    let dispatcher = EventDispatcher::new(client_id, supervisor);
    let rx = match dispatcher.connect().await {
        Ok(rx) => rx,
        Err(e) => {
            error!(error = %e, "Failed to register client");
            return;
        }
    };

    let (ws_sender, ws_receiver) = socket.split();
    let sender_task = handle_outgoing_messages(rx, ws_sender);
    let receiver_task = handle_incoming_messages(ws_receiver, &dispatcher);

    tokio::select! {
        _ = sender_task => {
            debug!("Sender task completed");
        }
        _ = receiver_task => {
            debug!("Receiver task completed");
        }
    }

    if let Err(e) = dispatcher.disconnect() {
        error!(error = %e, "Failed to disconnect");
    }
}

pub async fn handle_outgoing_messages(
    mut rx: Receiver<OutboundEvent>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    while let Some(event) = rx.recv().await {
        let text = match event.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Failed to serialize event");
                continue;
            }
        };
        if let Err(e) = ws_sender.send(Message::Text(text)).await {
            debug!(error = %e, "Failed to send message");
            break;
        }
    }
}

pub async fn handle_incoming_messages(
    mut receiver: SplitStream<WebSocket>,
    dispatcher: &EventDispatcher,
) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if let Err(e) = dispatcher.handle_text(&text).await {
                    error!(error = %e, "Failed to handle event");
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client closed the connection");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(message) => {
                warn!(?message, "Unsupported message type");
            }
            Err(e) => {
                debug!(error = %e, "Failed to receive message");
                break;
            }
        }
    }
}
