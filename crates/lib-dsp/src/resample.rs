//! Resampling to a common sampling interval.
//!
//! Recorded and simulated seismograms rarely share a sample rate. Every
//! channel is brought to the target interval before synchronization:
//!
//! - **Down-sampling** first removes content above the decimation frequency
//!   with a zero-phase Butterworth lowpass, then keeps every k-th sample when
//!   the ratio is an integer, or interpolates otherwise. The decimation
//!   frequency must stay below the Nyquist frequency of the target interval.
//! - **Up-sampling** interpolates onto the finer grid.
//!
//! The output has `round(duration / target_dt)` samples, so the duration is
//! preserved to within one sample.

use crate::error::{DspError, DspResult};
use crate::filter::{filter, FilterSpec, DEFAULT_ORDER};
use lib_types::station::Station;
use lib_types::timeseries::Timeseries;
use lib_types::units::{Hertz, Seconds};
use std::f64::consts::PI;

/// Relative tolerance under which two intervals are considered equal.
const DT_TOLERANCE: f64 = 1e-9;

/// Relative tolerance for treating a decimation ratio as an integer.
const RATIO_TOLERANCE: f64 = 1e-6;

/// Lanczos kernel half-width in input samples.
const LANCZOS_A: f64 = 3.0;

/// Check if two time steps are compatible (within tolerance).
///
/// # Arguments
///
/// * `dt1` - First time step
/// * `dt2` - Second time step
/// * `relative_tolerance` - Relative tolerance (e.g., 1e-6 for 0.0001%)
#[inline]
pub fn are_compatible_dt(dt1: Seconds, dt2: Seconds, relative_tolerance: f64) -> bool {
    let max_dt = dt1.0.max(dt2.0);
    if max_dt == 0.0 {
        return dt1.0 == dt2.0;
    }
    (dt1.0 - dt2.0).abs() / max_dt < relative_tolerance
}

/// Number of samples a series of `duration` has at interval `dt`.
#[inline]
pub fn samples_for_duration(duration: Seconds, dt: Seconds) -> usize {
    (duration / dt).round().max(0.0) as usize
}

/// Bring a series to `target_dt`.
///
/// # Errors
///
/// - `DecimationLimitExceeded` when down-sampling and `max_decimation_freq`
///   is at or above the Nyquist frequency of `target_dt`
/// - `InvalidConfig` for non-positive intervals or frequencies
/// - `InsufficientData` for an empty series
pub fn resample_to_dt(
    series: &Timeseries,
    target_dt: Seconds,
    max_decimation_freq: Hertz,
) -> DspResult<Timeseries> {
    if !(target_dt.0 > 0.0 && target_dt.0.is_finite()) {
        return Err(DspError::InvalidConfig(format!(
            "target dt must be positive, got {}",
            target_dt.0
        )));
    }
    if !(max_decimation_freq.0 > 0.0 && max_decimation_freq.0.is_finite()) {
        return Err(DspError::InvalidConfig(format!(
            "decimation frequency must be positive, got {}",
            max_decimation_freq.0
        )));
    }
    if series.is_empty() {
        return Err(DspError::InsufficientData { needed: 1, got: 0 });
    }

    if are_compatible_dt(series.dt, target_dt, DT_TOLERANCE) {
        return Ok(series.clone());
    }

    let new_len = samples_for_duration(series.duration(), target_dt);
    if new_len == 0 {
        return Err(DspError::InvalidConfig(format!(
            "resampling {} samples to dt={} s leaves no samples",
            series.samples(),
            target_dt.0
        )));
    }

    if target_dt.0 > series.dt.0 {
        decimate(series, target_dt, max_decimation_freq, new_len)
    } else {
        tracing::trace!(
            "Interpolating {} samples from dt={} s to dt={} s",
            series.samples(),
            series.dt.0,
            target_dt.0
        );
        Ok(Timeseries::new(
            interpolate(&series.data, series.dt, target_dt, new_len),
            target_dt,
        ))
    }
}

fn decimate(
    series: &Timeseries,
    target_dt: Seconds,
    max_decimation_freq: Hertz,
    new_len: usize,
) -> DspResult<Timeseries> {
    let nyquist = target_dt.nyquist();
    if max_decimation_freq.0 >= nyquist.0 {
        return Err(DspError::DecimationLimitExceeded {
            target_dt: target_dt.0,
            nyquist: nyquist.0,
            max_freq: max_decimation_freq.0,
        });
    }

    // Anti-alias before discarding samples
    let smoothed = filter(series, &FilterSpec::lowpass(max_decimation_freq, DEFAULT_ORDER))?;

    let ratio = target_dt / series.dt;
    let factor = ratio.round();
    let data = if (ratio - factor).abs() / ratio < RATIO_TOLERANCE {
        let step = factor as usize;
        tracing::trace!("Decimating by {} to dt={} s", step, target_dt.0);
        smoothed
            .data
            .iter()
            .step_by(step)
            .take(new_len)
            .copied()
            .collect()
    } else {
        tracing::trace!("Decimating by non-integer ratio {:.4} to dt={} s", ratio, target_dt.0);
        interpolate(&smoothed.data, series.dt, target_dt, new_len)
    };

    Ok(Timeseries::new(data, target_dt))
}

/// Windowed sinc (Lanczos) interpolation onto `new_len` points spaced `new_dt`.
fn interpolate(samples: &[f64], old_dt: Seconds, new_dt: Seconds, new_len: usize) -> Vec<f64> {
    let last = samples.len() as isize - 1;

    (0..new_len)
        .map(|i| {
            let old_index_f = i as f64 * new_dt.0 / old_dt.0;
            let index_min = (old_index_f - LANCZOS_A).floor() as isize;
            let index_max = (old_index_f + LANCZOS_A).ceil() as isize;

            // Normalize by the kernel sum so edges and DC are preserved
            let mut value = 0.0;
            let mut weight = 0.0;
            for k in index_min.max(0)..=index_max.min(last) {
                let kernel = windowed_sinc(old_index_f - k as f64, LANCZOS_A);
                value += samples[k as usize] * kernel;
                weight += kernel;
            }
            if weight.abs() > 1e-12 {
                value / weight
            } else {
                value
            }
        })
        .collect()
}

/// Windowed sinc interpolation kernel (Lanczos window).
///
/// # Arguments
///
/// * `x` - Distance from sample center
/// * `a` - Lanczos window parameter (typically 3)
#[inline]
fn windowed_sinc(x: f64, a: f64) -> f64 {
    if x.abs() < 1e-10 {
        return 1.0;
    }

    if x.abs() >= a {
        return 0.0;
    }

    let sinc_val = (PI * x).sin() / (PI * x);
    let window = (PI * x / a).sin() / (PI * x / a);

    sinc_val * window
}

/// Resample every channel of a station.
pub fn resample_station(
    station: Station,
    target_dt: Seconds,
    max_decimation_freq: Hertz,
) -> DspResult<Station> {
    let from_dt = station.dt();
    let from_samples = station.samples();
    let resampled =
        station.try_map_channels(|_, ts| resample_to_dt(&ts, target_dt, max_decimation_freq))?;

    if !are_compatible_dt(from_dt, target_dt, DT_TOLERANCE) {
        tracing::debug!(
            "Station '{}': dt {} s -> {} s, {} -> {} samples",
            resampled.name,
            from_dt.0,
            target_dt.0,
            from_samples,
            resampled.samples()
        );
    }
    Ok(resampled)
}
