//! Shared types for the EMG relay
//!
//! This crate contains the wire types exchanged with observer dashboards and the
//! filter settings shared between the control plane and the filtering pipeline.

pub mod comms;
pub mod config;
pub mod event;

// Re-export commonly used types
pub use comms::*;
pub use config::*;
pub use event::*;
