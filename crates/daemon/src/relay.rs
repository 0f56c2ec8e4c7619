//! The relay service: a single task that owns the filter pipeline, the sample
//! buffer and the observer registry.
//!
//! Socket handlers never touch that state directly. They send [`RelayCommand`]s
//! through a [`RelayHandle`] and the service applies them one at a time, so a
//! settings change always completes before the next sensor message is filtered.

use std::net::SocketAddr;

use emg_types::{
    ConnectionStatus, DeviceStatus, EmgSample, FilterSettings, FilterSettingsUpdate, OutboundEvent,
};
use pipeline::{FilterResult, FilterSettingsController};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcaster::{ClientId, ClientRegistry, Payload};
use crate::buffer::DistributionBuffer;
use crate::config::RelayConfig;
use crate::protocol::{parse_record, Orientation, SensorRecord};

#[derive(Debug)]
pub enum RelayCommand {
    SensorConnected {
        peer: SocketAddr,
    },
    /// One text frame from the sensor, possibly holding several records.
    SensorMessage {
        text: String,
    },
    SensorDisconnected {
        peer: SocketAddr,
    },
    Flush,
    RegisterClient {
        sender: mpsc::Sender<Payload>,
        reply: oneshot::Sender<ClientId>,
    },
    UnregisterClient {
        id: ClientId,
    },
    ApplySettings(FilterSettingsUpdate),
}

#[derive(Debug, Error)]
#[error("relay service has stopped")]
pub struct RelayClosed;

/// Cheap, cloneable front door to the relay service.
#[derive(Clone, Debug)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    pub(crate) fn new(tx: mpsc::Sender<RelayCommand>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, command: RelayCommand) -> Result<(), RelayClosed> {
        self.tx.send(command).await.map_err(|_| RelayClosed)
    }

    /// Registers an observer whose outbound queue is `sender` and returns its id.
    pub async fn register_client(&self, sender: mpsc::Sender<Payload>) -> Result<ClientId, RelayClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::RegisterClient { sender, reply }).await?;
        rx.await.map_err(|_| RelayClosed)
    }
}

/// What the relay last learned about the IMU from the record shapes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationState {
    pub available: bool,
    pub last: Option<Orientation>,
}

impl OrientationState {
    fn observe(&mut self, orientation: Option<Orientation>) {
        self.available = orientation.is_some();
        if orientation.is_some() {
            self.last = orientation;
        }
    }
}

pub struct RelayService {
    controller: FilterSettingsController,
    buffer: DistributionBuffer,
    clients: ClientRegistry,
    orientation: OrientationState,
    sensor: Option<SocketAddr>,
}

impl RelayService {
    pub fn new(config: &RelayConfig) -> FilterResult<Self> {
        let service = Self {
            controller: FilterSettingsController::new(config.filter)?,
            buffer: DistributionBuffer::new(config.buffer_capacity),
            clients: ClientRegistry::new(config.throttle_interval()),
            orientation: OrientationState::default(),
            sensor: None,
        };
        debug!(
            buffer_capacity = service.buffer.capacity(),
            throttle_ms = service.clients.throttle().as_millis() as u64,
            "Relay service ready"
        );
        Ok(service)
    }

    pub fn handle(&mut self, command: RelayCommand, now: Instant) {
        match command {
            RelayCommand::SensorConnected { peer } => self.sensor_connected(peer, now),
            RelayCommand::SensorMessage { text } => self.ingest(&text, now),
            RelayCommand::SensorDisconnected { peer } => self.sensor_disconnected(peer, now),
            RelayCommand::Flush => {
                self.flush(now);
            }
            RelayCommand::RegisterClient { sender, reply } => {
                let id = self.register_client(sender);
                if reply.send(id).is_err() {
                    // The handler went away before learning its id.
                    self.clients.unregister(&id);
                }
            }
            RelayCommand::UnregisterClient { id } => self.unregister_client(&id),
            RelayCommand::ApplySettings(update) => {
                if update.is_empty() {
                    debug!("Ignoring filter_settings message without fields");
                    return;
                }
                // Failures are logged by the controller and leave the old settings live.
                let _ = self.controller.apply(&update);
            }
        }
    }

    pub fn sensor_connected(&mut self, peer: SocketAddr, now: Instant) {
        if let Some(previous) = self.sensor.replace(peer) {
            warn!(%peer, %previous, "Sensor connected while another sensor is active");
        }
        info!(%peer, "Sensor connected");
        self.clients
            .broadcast(&device_status(ConnectionStatus::Connected, peer), now);
    }

    pub fn sensor_disconnected(&mut self, peer: SocketAddr, now: Instant) {
        if self.sensor == Some(peer) {
            self.sensor = None;
        }
        info!(%peer, "Sensor disconnected");
        self.clients
            .broadcast(&device_status(ConnectionStatus::Disconnected, peer), now);
    }

    /// Parses every line of a sensor frame. Raw records are filtered and
    /// buffered; statistics go straight to observers.
    pub fn ingest(&mut self, text: &str, now: Instant) {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let record = match parse_record(line) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    debug!("Ignoring sensor record with unexpected shape: {:?}", line);
                    continue;
                }
                Err(e) => {
                    warn!("Dropping sensor record {:?}: {}", line, e);
                    continue;
                }
            };

            match record {
                SensorRecord::Raw {
                    ch1,
                    ch2,
                    orientation,
                } => {
                    self.orientation.observe(orientation);
                    let (filtered1, filtered2) = self.controller.pipeline_mut().process_frame(ch1, ch2);
                    let evicted = self.buffer.append(EmgSample {
                        raw1: ch1,
                        filtered1,
                        raw2: ch2,
                        filtered2,
                        pitch: orientation.map(|o| o.pitch),
                        roll: orientation.map(|o| o.roll),
                    });
                    if evicted > 0 {
                        debug!(
                            evicted,
                            total_dropped = self.buffer.dropped(),
                            "Distribution buffer overflow"
                        );
                    }
                }
                SensorRecord::Stats(stats) => {
                    let orientation = stats
                        .pitch
                        .zip(stats.roll)
                        .map(|(pitch, roll)| Orientation { pitch, roll });
                    self.orientation.observe(orientation);
                    self.clients.broadcast(&OutboundEvent::from(stats), now);
                }
            }
        }
    }

    /// Broadcasts and removes every buffered sample in arrival order. All of
    /// them share `now`, so each observer gets at most the first one.
    pub fn flush(&mut self, now: Instant) -> usize {
        let mut flushed = 0;
        for sample in self.buffer.drain() {
            self.clients.broadcast(&OutboundEvent::from(sample), now);
            flushed += 1;
        }
        flushed
    }

    pub fn register_client(&mut self, sender: mpsc::Sender<Payload>) -> ClientId {
        let snapshot = OutboundEvent::MpuStatus {
            available: self.orientation.available,
        };
        let id = self.clients.register(sender, &snapshot);
        info!(client_id = %id, "Observer connected. Total observers: {}", self.clients.len());
        id
    }

    pub fn unregister_client(&mut self, id: &ClientId) {
        if self.clients.unregister(id) {
            info!(client_id = %id, "Observer disconnected. Total observers: {}", self.clients.len());
        }
    }

    pub fn settings(&self) -> &FilterSettings {
        self.controller.settings()
    }

    pub fn orientation(&self) -> OrientationState {
        self.orientation
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Applies commands until every handle is dropped or `shutdown` fires,
    /// then flushes whatever is still buffered.
    pub async fn run(mut self, mut commands: mpsc::Receiver<RelayCommand>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command, Instant::now()),
                    None => break,
                },
            }
        }

        let flushed = self.flush(Instant::now());
        info!(flushed, "Relay service stopped");
    }
}

/// Starts the relay service on its own task.
pub fn spawn(service: RelayService, queue_depth: usize, shutdown: CancellationToken) -> (RelayHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let task = tokio::spawn(service.run(rx, shutdown));
    (RelayHandle::new(tx), task)
}

fn device_status(status: ConnectionStatus, peer: SocketAddr) -> OutboundEvent {
    let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
    DeviceStatus {
        status,
        timestamp,
        client_info: peer.to_string(),
    }
    .into()
}
