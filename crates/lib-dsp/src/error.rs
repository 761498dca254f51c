//! Error types for seismogram processing.

use thiserror::Error;

/// Errors that can occur while conditioning seismograms.
///
/// All of them are deterministic for a given input, so none is retried.
#[derive(Debug, Error)]
pub enum DspError {
    /// Filter cutoffs are malformed or beyond Nyquist.
    #[error("Invalid frequency range: fmin={fmin} Hz, fmax={fmax} Hz (Nyquist {nyquist} Hz)")]
    InvalidFrequencyRange { fmin: f64, fmax: f64, nyquist: f64 },

    /// Horizontal channels disagree in length or sampling interval.
    #[error("Channel mismatch in station '{station}': {detail}")]
    ChannelMismatch { station: String, detail: String },

    /// Target interval would discard frequencies the caller wants kept.
    #[error(
        "Decimation limit exceeded: target dt={target_dt} s has Nyquist {nyquist} Hz, \
         at or below the decimation frequency {max_freq} Hz"
    )]
    DecimationLimitExceeded {
        target_dt: f64,
        nyquist: f64,
        max_freq: f64,
    },

    /// Stations disagree in sample count after synchronization.
    #[error("Sample count mismatch: station '{station}' has {actual} samples, expected {expected}")]
    SampleCountMismatch {
        station: String,
        expected: usize,
        actual: usize,
    },

    /// Validation gate rejected a station.
    #[error("Invalid signal in station '{station}': {reason}")]
    InvalidSignal { station: String, reason: String },

    /// A cut would remove every sample of a series.
    #[error("Cutting {count} samples from the {edge} of a {samples}-sample series is out of range")]
    CutOutOfRange {
        edge: &'static str,
        count: usize,
        samples: usize,
    },

    /// The recording stamp could not be obtained.
    #[error("Cannot read recording stamp: {0}")]
    StampUnavailable(String),

    /// Insufficient data for operation.
    #[error("Insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid configuration parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DspError {
    /// Name of the station the error refers to, if any.
    pub fn station(&self) -> Option<&str> {
        match self {
            Self::ChannelMismatch { station, .. }
            | Self::SampleCountMismatch { station, .. }
            | Self::InvalidSignal { station, .. } => Some(station),
            _ => None,
        }
    }
}

/// Result type for DSP operations.
pub type DspResult<T> = Result<T, DspError>;
