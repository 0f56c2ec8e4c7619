//! Real-time conditioning for the two EMG channels.
//!
//! Each raw sample passes through an optional 60 Hz notch and a Butterworth
//! low-pass/high-pass cascade. Filter state is carried between samples and is
//! re-seeded to its steady state whenever the settings change.

pub mod control;
pub mod design;
pub mod error;
pub mod iir;
pub mod pipeline;

// Re-export commonly used types
pub use control::*;
pub use design::*;
pub use error::*;
pub use iir::*;
pub use pipeline::*;
