//! Outbound events for observer dashboards
//!
//! Every event is serialized as a single JSON object carrying a `type` tag, e.g.
//! `{"type":"emg_data","raw1":512.0,"filtered1":3.2,"raw2":498.0,"filtered2":-1.7}`.

use serde::{Deserialize, Serialize};

/// One conditioned two-channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmgSample {
    pub raw1: f64,
    pub filtered1: f64,
    pub raw2: f64,
    pub filtered2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
}

/// Device-side statistics, forwarded unfiltered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    pub rms1: f64,
    pub rms2: f64,
    pub mean1: f64,
    pub mean2: f64,
    pub imbalance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Sensor connection lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub status: ConnectionStatus,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    #[serde(rename = "clientInfo")]
    pub client_info: String,
}

/// Everything the relay sends to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    EmgData(EmgSample),
    EmgStats(StatsSample),
    #[serde(rename = "esp32_status")]
    DeviceStatus(DeviceStatus),
    MpuStatus { available: bool },
}

impl OutboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundEvent::EmgData(_) => "emg_data",
            OutboundEvent::EmgStats(_) => "emg_stats",
            OutboundEvent::DeviceStatus(_) => "esp32_status",
            OutboundEvent::MpuStatus { .. } => "mpu_status",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<EmgSample> for OutboundEvent {
    fn from(sample: EmgSample) -> Self {
        OutboundEvent::EmgData(sample)
    }
}

impl From<StatsSample> for OutboundEvent {
    fn from(stats: StatsSample) -> Self {
        OutboundEvent::EmgStats(stats)
    }
}

impl From<DeviceStatus> for OutboundEvent {
    fn from(status: DeviceStatus) -> Self {
        OutboundEvent::DeviceStatus(status)
    }
}
