//! Observer bookkeeping and throttled fan-out.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use emg_types::OutboundEvent;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

pub type ClientId = Uuid;

/// A serialized event, shared by every client queue it is pushed to.
pub type Payload = Arc<str>;

/// Minimum spacing between two sends to the same observer.
pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(20);

struct Client {
    /// Queue drained by the client's socket writer task.
    sender: mpsc::Sender<Payload>,
    /// When this client last had an event queued, shared across event kinds.
    last_send: Option<Instant>,
}

/// Tracks connected observers and fans events out to them.
///
/// Sending never waits: each client has a bounded queue and a full or closed
/// queue only affects that client.
pub struct ClientRegistry {
    clients: HashMap<ClientId, Client>,
    throttle: Duration,
}

impl ClientRegistry {
    pub fn new(throttle: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            throttle,
        }
    }

    /// Adds a client and queues `snapshot` for it alone. The snapshot does not
    /// count against the throttle.
    pub fn register(&mut self, sender: mpsc::Sender<Payload>, snapshot: &OutboundEvent) -> ClientId {
        let id = Uuid::new_v4();
        match snapshot.to_json() {
            Ok(json) => {
                if let Err(e) = sender.try_send(Payload::from(json)) {
                    warn!(client_id = %id, "Failed to queue {} snapshot: {}", snapshot.kind(), e);
                }
            }
            Err(e) => error!("Failed to serialize {} snapshot: {}", snapshot.kind(), e),
        }

        self.clients.insert(
            id,
            Client {
                sender,
                last_send: None,
            },
        );
        id
    }

    /// Removes the client together with its throttle timestamp.
    pub fn unregister(&mut self, id: &ClientId) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Queues `event` for every client whose throttle window has elapsed.
    /// Returns the number of clients the event was queued for.
    pub fn broadcast(&mut self, event: &OutboundEvent, now: Instant) -> usize {
        if self.clients.is_empty() {
            return 0;
        }

        let payload: Payload = match event.to_json() {
            Ok(json) => Payload::from(json),
            Err(e) => {
                error!("Failed to serialize {} event: {}", event.kind(), e);
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, client) in self.clients.iter_mut() {
            if let Some(last) = client.last_send {
                if now.saturating_duration_since(last) < self.throttle {
                    continue;
                }
            }
            client.last_send = Some(now);

            match client.sender.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(client_id = %id, "Client queue full, dropping {} event", event.kind());
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(client_id = %id, "Client writer has gone away, dropping {} event", event.kind());
                }
            }
        }
        delivered
    }

    #[cfg(test)]
    fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}
