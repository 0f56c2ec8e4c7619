//! Error types for filter design and reconfiguration

use thiserror::Error;

/// Errors raised while designing or installing filter coefficients.
///
/// A low-pass cutoff at or above Nyquist is clamped rather than reported; every
/// other out-of-range parameter ends up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("sample rate must be > 0, got {0} Hz")]
    InvalidSampleRate(f64),

    #[error("filter order must be >= 1")]
    InvalidOrder,

    #[error("{stage} cutoff {cutoff_hz} Hz is outside (0, {nyquist_hz}) Hz")]
    InvalidCutoff {
        stage: &'static str,
        cutoff_hz: f64,
        nyquist_hz: f64,
    },

    #[error("notch quality factor must be > 0, got {0}")]
    InvalidQuality(f64),

    #[error("invalid coefficients: {0}")]
    BadCoefficients(String),
}

/// Result type for filter operations
pub type FilterResult<T> = Result<T, FilterError>;
