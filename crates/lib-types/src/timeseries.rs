//! Single-component ground-motion time series.
//!
//! # Sample Semantics
//!
//! Samples are point measurements at `t[i] = i * dt` relative to the start of
//! the series. A series with `N` samples has duration `N * dt`, the span from
//! the first sample to one interval past the last.
//!
//! The sample count is always `data.len()`, so every operation that changes
//! the length keeps the count consistent by construction.

use crate::units::Seconds;
use serde::{Deserialize, Serialize};

/// A uniformly-sampled component of motion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeseries {
    /// Sampling interval.
    pub dt: Seconds,

    /// Amplitude samples.
    pub data: Vec<f64>,
}

impl Timeseries {
    /// Create a series from samples.
    pub fn new(data: Vec<f64>, dt: Seconds) -> Self {
        Self { dt, data }
    }

    /// Create a zero-valued series of the given length.
    pub fn zeros(len: usize, dt: Seconds) -> Self {
        Self {
            dt,
            data: vec![0.0; len],
        }
    }

    /// Number of samples.
    #[inline]
    pub fn samples(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total duration, `samples * dt`.
    #[inline]
    pub fn duration(&self) -> Seconds {
        Seconds(self.data.len() as f64 * self.dt.0)
    }

    /// Sample rate (reciprocal of dt).
    #[inline]
    pub fn sample_rate(&self) -> f64 {
        1.0 / self.dt.0
    }

    /// Maximum absolute value.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().map(|v| v.abs()).fold(0.0, f64::max)
    }

    /// Whether every sample is finite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Whether all samples lie within `tolerance` of the first one.
    pub fn is_constant(&self, tolerance: f64) -> bool {
        match self.data.first() {
            Some(&first) => self.data.iter().all(|v| (v - first).abs() <= tolerance),
            None => true,
        }
    }

    /// Drop `count` samples from the front.
    pub fn cut_front(mut self, count: usize) -> Self {
        let count = count.min(self.data.len());
        self.data.drain(..count);
        self
    }

    /// Drop `count` samples from the end.
    pub fn cut_end(mut self, count: usize) -> Self {
        let keep = self.data.len().saturating_sub(count);
        self.data.truncate(keep);
        self
    }

    /// Prepend `count` zeros.
    pub fn pad_front(mut self, count: usize) -> Self {
        if count > 0 {
            self.data.splice(0..0, std::iter::repeat(0.0).take(count));
        }
        self
    }

    /// Append `count` zeros.
    pub fn pad_end(mut self, count: usize) -> Self {
        self.data.resize(self.data.len() + count, 0.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeseries_basics() {
        let ts = Timeseries::new(vec![0.0, 0.5, -1.0, 0.5], Seconds(0.01));

        assert_eq!(ts.samples(), 4);
        assert!((ts.duration().0 - 0.04).abs() < 1e-12);
        assert!((ts.max_abs() - 1.0).abs() < 1e-12);
        assert!((ts.sample_rate() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cut_and_pad_keep_count_consistent() {
        let ts = Timeseries::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], Seconds(0.1));

        let ts = ts.cut_front(2);
        assert_eq!(ts.data, vec![3.0, 4.0, 5.0]);

        let ts = ts.pad_front(2).pad_end(1);
        assert_eq!(ts.data, vec![0.0, 0.0, 3.0, 4.0, 5.0, 0.0]);
        assert_eq!(ts.samples(), 6);

        let ts = ts.cut_end(4);
        assert_eq!(ts.data, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cut_beyond_length_empties() {
        let ts = Timeseries::new(vec![1.0, 2.0], Seconds(0.1));
        assert!(ts.clone().cut_front(5).is_empty());
        assert!(ts.cut_end(5).is_empty());
    }

    #[test]
    fn test_signal_checks() {
        let flat = Timeseries::new(vec![2.0; 10], Seconds(0.1));
        assert!(flat.is_constant(0.0));
        assert!(flat.is_finite());

        let bad = Timeseries::new(vec![0.0, f64::NAN, 1.0], Seconds(0.1));
        assert!(!bad.is_finite());
        assert!(!bad.is_constant(1e-12));
    }
}
