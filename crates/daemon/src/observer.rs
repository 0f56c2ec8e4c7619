//! Dashboard side of the relay.

use axum::extract::ws::{Message, WebSocket};
use emg_types::ClientMessage;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broadcaster::Payload;
use crate::relay::{RelayCommand, RelayHandle};

/// Serves one observer connection until it closes.
///
/// Outbound events arrive on a bounded queue drained by a dedicated writer
/// task, so a slow dashboard only ever loses its own events.
pub async fn handle_observer_socket(socket: WebSocket, relay: RelayHandle, queue_depth: usize) {
    let (tx, mut rx) = mpsc::channel::<Payload>(queue_depth.max(1));
    let id = match relay.register_client(tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Refusing observer: {}", e);
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(payload.to_string())).await {
                debug!(client_id = %id, "Observer write failed: {}", e);
                break;
            }
        }
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::parse(&text) {
                Ok(ClientMessage::FilterSettings(update)) => {
                    if relay.send(RelayCommand::ApplySettings(update)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(client_id = %id, "Ignoring observer message {:?}: {}", text, e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(client_id = %id, "Observer connection error: {}", e);
                break;
            }
        }
    }

    if relay.send(RelayCommand::UnregisterClient { id }).await.is_err() {
        debug!(client_id = %id, "Relay stopped before observer was unregistered");
    }
    writer.abort();
}
