//! Rotation of horizontal components.
//!
//! Channel 0 is taken as north and channel 1 as east. Rotating by an azimuth
//! (degrees clockwise from north) produces radial and transverse components:
//!
//! ```text
//! radial     =  ns * cos(az) + ew * sin(az)
//! transverse = -ns * sin(az) + ew * cos(az)
//! ```
//!
//! The vertical channel is passed through unchanged.

use crate::error::{DspError, DspResult};
use crate::resample::are_compatible_dt;
use lib_types::station::Station;
use lib_types::timeseries::Timeseries;

/// Relative tolerance when comparing the intervals of two channels.
const DT_TOLERANCE: f64 = 1e-9;

/// Rotate the horizontal pair of a station by `azimuth` degrees.
///
/// `None` requests no rotation and returns the station as is.
pub fn rotate(station: &Station, azimuth: Option<f64>) -> DspResult<Station> {
    let Some(azimuth) = azimuth else {
        return Ok(station.clone());
    };

    if !azimuth.is_finite() {
        return Err(DspError::InvalidConfig(format!(
            "rotation azimuth must be finite, got {}",
            azimuth
        )));
    }

    let (ns, ew) = station.horizontal();
    if ns.samples() != ew.samples() {
        return Err(DspError::ChannelMismatch {
            station: station.name.clone(),
            detail: format!(
                "horizontal channels have {} and {} samples",
                ns.samples(),
                ew.samples()
            ),
        });
    }
    if !are_compatible_dt(ns.dt, ew.dt, DT_TOLERANCE) {
        return Err(DspError::ChannelMismatch {
            station: station.name.clone(),
            detail: format!("horizontal channels have dt {} s and {} s", ns.dt.0, ew.dt.0),
        });
    }

    let (sin, cos) = azimuth.to_radians().sin_cos();
    let (radial, transverse): (Vec<f64>, Vec<f64>) = ns
        .data
        .iter()
        .zip(&ew.data)
        .map(|(&n, &e)| (n * cos + e * sin, -n * sin + e * cos))
        .unzip();

    tracing::debug!("Rotated station '{}' by {} degrees", station.name, azimuth);

    Ok(Station::new(
        station.name.clone(),
        [
            Timeseries::new(radial, ns.dt),
            Timeseries::new(transverse, ns.dt),
            station.vertical().clone(),
        ],
    ))
}
