//! WebSocket relay between one EMG wearable and any number of dashboards.
pub mod broadcaster;
pub mod buffer;
pub mod config;
pub mod ingest;
pub mod observer;
pub mod protocol;
pub mod relay;
pub mod server;

pub use config::{Cli, RelayConfig};
pub use relay::{RelayCommand, RelayHandle, RelayService};
pub use server::RelayServer;
