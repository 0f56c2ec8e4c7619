//! Sensor side of the relay.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::relay::{RelayCommand, RelayHandle};

/// Serves one sensor connection until it closes.
///
/// The buffer flush ticker lives exactly as long as the connection and flushes
/// one last time on the way out, after the disconnect notice.
pub async fn handle_sensor_socket(
    mut socket: WebSocket,
    peer: SocketAddr,
    relay: RelayHandle,
    flush_period: Duration,
) {
    if relay.send(RelayCommand::SensorConnected { peer }).await.is_err() {
        return;
    }

    let connection = CancellationToken::new();
    let ticker = tokio::spawn(run_flush_ticker(
        relay.clone(),
        flush_period,
        connection.clone(),
    ));

    while let Some(message) = socket.recv().await {
        match message {
            Ok(Message::Text(text)) => {
                if relay.send(RelayCommand::SensorMessage { text }).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(bytes)) => {
                debug!(%peer, len = bytes.len(), "Ignoring binary frame from sensor");
            }
            Ok(Message::Close(frame)) => {
                debug!(%peer, ?frame, "Sensor sent close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(%peer, "Sensor connection error: {}", e);
                break;
            }
        }
    }

    // Observers hear about the disconnect before the final flush can claim
    // their throttle window.
    if relay.send(RelayCommand::SensorDisconnected { peer }).await.is_err() {
        info!(%peer, "Relay stopped before sensor disconnect was recorded");
    }
    connection.cancel();
    if let Err(e) = ticker.await {
        warn!(%peer, "Flush ticker ended abnormally: {}", e);
    }
}

/// Asks the relay to flush every `period` until `connection` is cancelled, then
/// once more.
pub async fn run_flush_ticker(relay: RelayHandle, period: Duration, connection: CancellationToken) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = connection.cancelled() => break,
            _ = interval.tick() => {
                if relay.send(RelayCommand::Flush).await.is_err() {
                    return;
                }
            }
        }
    }

    if relay.send(RelayCommand::Flush).await.is_err() {
        debug!("Relay stopped before the final flush");
    }
}
