//! # lib-dsp
//!
//! Conditioning engine that makes recorded and simulated seismograms
//! directly comparable.
//!
//! - **Filter**: Butterworth low/high/band-pass, applied forward and backward
//! - **Rotation**: horizontal components to radial/transverse
//! - **Resampling**: anti-aliased decimation and windowed-sinc interpolation
//! - **Synchronization**: common start, duration and sample count
//! - **Validation**: rejection of malformed stations
//! - **Pipeline**: the ordered batch run over an [`Ensemble`](lib_types::Ensemble)

pub mod error;
pub mod filter;
pub mod taper;
pub mod rotation;
pub mod resample;
pub mod sync;
pub mod validation;
pub mod pipeline;

pub use error::{DspError, DspResult};
pub use filter::{filter, BandType, FilterBand, FilterSpec, SosFilter};
pub use pipeline::{process, ProcessingParams, StampSource};
pub use resample::resample_to_dt;
pub use rotation::rotate;
pub use sync::{synchronize, FrontAlignment};
pub use validation::{DegenerateAction, InvalidSignalAction, ValidationPolicy};
