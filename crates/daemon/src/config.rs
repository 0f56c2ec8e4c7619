use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context};
use clap::Parser;
use emg_types::FilterSettings;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Runtime configuration of the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address all three listeners bind to
    pub bind_address: IpAddr,
    /// WebSocket port for dashboards
    pub observer_port: u16,
    /// WebSocket port for the wearable
    pub sensor_port: u16,
    /// Port of the static file server
    pub http_port: u16,
    pub static_dir: PathBuf,
    /// Filter settings in effect at startup
    pub filter: FilterSettings,
    /// Minimum spacing between two sends to one observer, in milliseconds
    pub throttle_interval_ms: u64,
    /// Conditioned samples held between flushes
    pub buffer_capacity: usize,
    /// Period of the buffer flush while a sensor is connected, in milliseconds
    pub flush_interval_ms: u64,
    /// Outbound messages queued per observer before events are dropped for it
    pub client_queue_depth: usize,
    pub command_queue_depth: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            observer_port: 8080,
            sensor_port: 8081,
            http_port: 8000,
            static_dir: PathBuf::from("static"),
            filter: FilterSettings::default(),
            throttle_interval_ms: 20,
            buffer_capacity: 50,
            flush_interval_ms: 100,
            client_queue_depth: 32,
            command_queue_depth: 1024,
        }
    }
}

impl RelayConfig {
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.buffer_capacity > 0, "buffer_capacity must be at least 1");
        ensure!(self.flush_interval_ms > 0, "flush_interval_ms must be positive");
        ensure!(self.client_queue_depth > 0, "client_queue_depth must be at least 1");
        ensure!(self.command_queue_depth > 0, "command_queue_depth must be at least 1");
        Ok(())
    }
}

/// Reads a JSON config file. Fields missing from the file keep their defaults.
pub fn load_config(path: &Path) -> anyhow::Result<RelayConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read configuration file at '{}'", path.display()))?;
    let config: RelayConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Could not parse configuration file at '{}'", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[derive(Debug, Parser)]
#[command(name = "emg_relay", about = "Relays and filters EMG data from a wearable to dashboards")]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Observer WebSocket port
    #[arg(long, env = "WEB_CLIENT_PORT")]
    pub observer_port: Option<u16>,

    /// Sensor WebSocket port
    #[arg(long, env = "ESP32_PORT")]
    pub sensor_port: Option<u16>,

    /// Static HTTP port
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    #[arg(long)]
    pub bind: Option<IpAddr>,
}

impl Cli {
    /// Builds the effective configuration: defaults, then the config file, then
    /// command-line and environment values.
    pub fn into_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RelayConfig::default(),
        };

        if let Some(port) = self.observer_port {
            config.observer_port = port;
        }
        if let Some(port) = self.sensor_port {
            config.sensor_port = port;
        }
        if let Some(port) = self.http_port {
            config.http_port = port;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = dir;
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }

        config.validate()?;
        Ok(config)
    }
}
