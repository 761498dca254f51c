//! Batch processing of an ensemble.
//!
//! Stage order: rotate simulated stations, resample every station, read the
//! recording stamp, synchronize, check sample counts, validate, filter. Any
//! error aborts the batch and nothing is returned.

use crate::error::{DspError, DspResult};
use crate::filter::{filter_station, FilterBand, DEFAULT_ORDER};
use crate::resample::resample_station;
use crate::rotation::rotate;
use crate::sync::synchronize;
use crate::taper::DEFAULT_TAPER_SAMPLES;
use crate::validation::{validate_ensemble, ValidationPolicy};
use lib_types::station::{Ensemble, Station};
use lib_types::time::{EventTiming, Stamp};
use lib_types::units::{Hertz, Seconds};
use rayon::prelude::*;

/// Immutable parameters shared by every stage of one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessingParams {
    /// Rotation azimuth in degrees; `None` leaves orientation unchanged.
    pub azimuth: Option<f64>,
    pub target_dt: Seconds,
    /// Highest frequency decimation must preserve.
    pub decimation_fmax: Hertz,
    /// Final filter band.
    pub band: FilterBand,
    /// Origin and leading time; required when recorded data carries a stamp.
    pub timing: Option<EventTiming>,
    pub filter_order: usize,
    /// Samples tapered before zero padding.
    pub taper_samples: usize,
    pub validation: ValidationPolicy,
}

impl ProcessingParams {
    /// Parameters with default order, taper and validation policy.
    pub fn new(target_dt: Seconds, decimation_fmax: Hertz, band: FilterBand) -> DspResult<Self> {
        let params = Self {
            azimuth: None,
            target_dt,
            decimation_fmax,
            band,
            timing: None,
            filter_order: DEFAULT_ORDER,
            taper_samples: DEFAULT_TAPER_SAMPLES,
            validation: ValidationPolicy::default(),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_azimuth(mut self, azimuth: Option<f64>) -> Self {
        self.azimuth = azimuth;
        self
    }

    pub fn with_timing(mut self, timing: Option<EventTiming>) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_filter_order(mut self, order: usize) -> Self {
        self.filter_order = order;
        self
    }

    pub fn with_taper_samples(mut self, samples: usize) -> Self {
        self.taper_samples = samples;
        self
    }

    pub fn with_validation(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }

    /// Reject parameter sets no stage could run with.
    pub fn validate(&self) -> DspResult<()> {
        if !(self.target_dt.0 > 0.0 && self.target_dt.0.is_finite()) {
            return Err(DspError::InvalidConfig(format!(
                "target dt must be positive, got {}",
                self.target_dt.0
            )));
        }
        if !(self.decimation_fmax.0 > 0.0 && self.decimation_fmax.0.is_finite()) {
            return Err(DspError::InvalidConfig(format!(
                "decimation frequency must be positive, got {}",
                self.decimation_fmax.0
            )));
        }
        if self.filter_order == 0 {
            return Err(DspError::InvalidConfig("filter order must be at least 1".into()));
        }
        if let Some(azimuth) = self.azimuth {
            if !azimuth.is_finite() {
                return Err(DspError::InvalidConfig(format!("azimuth must be finite, got {}", azimuth)));
            }
        }
        if let Some(timing) = &self.timing {
            if !(timing.leading.0 >= 0.0 && timing.leading.0.is_finite()) {
                return Err(DspError::InvalidConfig(format!(
                    "leading time must be non-negative, got {}",
                    timing.leading.0
                )));
            }
        }

        let nyquist = self.target_dt.nyquist();
        let (fmin, fmax) = match self.band {
            FilterBand::Lowpass(f) => (Hertz::ZERO, f),
            FilterBand::Highpass(f) => (f, f),
            FilterBand::Bandpass(lo, hi) => (lo, hi),
        };
        let in_range = |f: Hertz| f.0 > 0.0 && f.0 < nyquist.0;
        let lower_ok = matches!(self.band, FilterBand::Lowpass(_)) || in_range(fmin);
        let ordered = !matches!(self.band, FilterBand::Bandpass(..)) || fmin.0 < fmax.0;
        if !(lower_ok && in_range(fmax) && ordered) {
            return Err(DspError::InvalidFrequencyRange {
                fmin: fmin.0,
                fmax: fmax.0,
                nyquist: nyquist.0,
            });
        }
        Ok(())
    }
}

/// Provider of the recorded station's start time.
///
/// Only consulted when the batch contains recorded data.
pub trait StampSource {
    fn recording_stamp(&self) -> DspResult<Option<Stamp>>;
}

impl StampSource for Option<Stamp> {
    fn recording_stamp(&self) -> DspResult<Option<Stamp>> {
        Ok(*self)
    }
}

/// Run the full conditioning pipeline over a batch.
pub fn process<S>(ensemble: Ensemble, stamps: &S, params: &ProcessingParams) -> DspResult<Ensemble>
where
    S: StampSource + ?Sized,
{
    params.validate()?;
    if ensemble.simulated.is_empty() {
        return Err(DspError::InsufficientData {
            needed: 1,
            got: 0,
        });
    }

    let Ensemble { recorded, simulated } = ensemble;
    tracing::info!(
        "Processing {} simulated station(s){}",
        simulated.len(),
        if recorded.is_some() { " and recorded data" } else { "" }
    );

    tracing::info!("Stage: rotation ({:?} degrees)", params.azimuth);
    let simulated = simulated
        .into_par_iter()
        .map(|s| rotate(&s, params.azimuth))
        .collect::<DspResult<Vec<_>>>()?;

    tracing::info!("Stage: resampling to dt={} s", params.target_dt.0);
    let resample = |s: Station| resample_station(s, params.target_dt, params.decimation_fmax);
    let recorded = recorded.map(resample).transpose()?;
    let simulated = simulated
        .into_par_iter()
        .map(resample)
        .collect::<DspResult<Vec<_>>>()?;

    let stamp = if recorded.is_some() {
        tracing::info!("Stage: reading recording stamp");
        stamps.recording_stamp()?
    } else {
        None
    };

    tracing::info!("Stage: synchronization");
    let ensemble = synchronize(
        Ensemble::new(recorded, simulated),
        stamp.as_ref(),
        params.timing.as_ref(),
        params.taper_samples,
    )?;

    check_sample_counts(&ensemble)?;

    tracing::info!("Stage: validation");
    let ensemble = validate_ensemble(ensemble, &params.validation)?;

    tracing::info!("Stage: filtering {}", params.band);
    let ensemble = filter_ensemble(ensemble, params.band, params.filter_order)?;

    tracing::info!("Processed {} station(s)", ensemble.len());
    Ok(ensemble)
}

/// Every channel of every station must hold the same number of samples.
pub fn check_sample_counts(ensemble: &Ensemble) -> DspResult<()> {
    let expected = ensemble.stations().map(Station::max_samples).max().unwrap_or(0);

    for station in ensemble.stations() {
        if let Some(channel) = station.channels.iter().find(|c| c.samples() != expected) {
            return Err(DspError::SampleCountMismatch {
                station: station.name.clone(),
                expected,
                actual: channel.samples(),
            });
        }
    }
    Ok(())
}

/// Apply `band` to every channel of every station.
pub fn filter_ensemble(ensemble: Ensemble, band: FilterBand, order: usize) -> DspResult<Ensemble> {
    let spec = band.spec(order);
    let Ensemble { recorded, simulated } = ensemble;

    let recorded = recorded.map(|s| filter_station(s, &spec)).transpose()?;
    let simulated = simulated
        .into_par_iter()
        .map(|s| filter_station(s, &spec))
        .collect::<DspResult<Vec<_>>>()?;

    Ok(Ensemble::new(recorded, simulated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::time::TimeOfDay;
    use lib_types::timeseries::Timeseries;
    use std::f64::consts::PI;

    fn station(name: &str, dt: f64, seconds: f64) -> Station {
        let n = (seconds / dt).round() as usize;
        let ch = |freq: f64| {
            Timeseries::new(
                (0..n).map(|i| (2.0 * PI * freq * i as f64 * dt).sin()).collect(),
                Seconds(dt),
            )
        };
        Station::new(name, [ch(1.0), ch(0.7), ch(2.0)])
    }

    fn params() -> ProcessingParams {
        ProcessingParams::new(
            Seconds(0.02),
            Hertz(5.0),
            FilterBand::Bandpass(Hertz(0.1), Hertz(5.0)),
        )
        .unwrap()
    }

    #[test]
    fn test_process_with_recorded_data() {
        let ensemble = Ensemble::new(
            Some(station("obs", 0.005, 30.0)),
            vec![station("sim1", 0.01, 40.0), station("sim2", 0.01, 40.0)],
        );
        let timing = EventTiming::new(TimeOfDay::new(5.0, 0.0, 10.0), Seconds(20.0));
        let params = params().with_timing(Some(timing)).with_azimuth(Some(30.0));

        let out = process(ensemble, &Some(TimeOfDay::new(5.0, 0.0, 0.0)), &params).unwrap();

        assert_eq!(out.len(), 3);
        for station in out.stations() {
            assert!(station.has_uniform_channels());
            assert_eq!(station.samples(), 2000);
            assert!((station.dt().0 - 0.02).abs() < 1e-15);
            assert!(station.channels.iter().all(Timeseries::is_finite));
        }
        assert_eq!(out.simulated[1].name, "sim2");
    }

    #[test]
    fn test_process_without_recorded_data() {
        let ensemble = Ensemble::new(
            None,
            vec![station("sim1", 0.01, 20.0), station("sim2", 0.02, 25.0)],
        );
        let out = process(ensemble, &None::<Stamp>, &params()).unwrap();

        assert!(out.recorded.is_none());
        for station in &out.simulated {
            assert_eq!(station.samples(), 1000);
        }
    }

    #[test]
    fn test_sample_count_mismatch_is_fatal() {
        let mut sim1 = station("sim1", 0.02, 20.0);
        sim1.channels[2].data.truncate(997);
        let ensemble = Ensemble::new(None, vec![sim1, station("sim2", 0.02, 20.0)]);

        match process(ensemble, &None::<Stamp>, &params()) {
            Err(DspError::SampleCountMismatch { station, expected, actual }) => {
                assert_eq!(station, "sim1");
                assert_eq!(expected, 1000);
                assert_eq!(actual, 997);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_decimation_limit_aborts_batch() {
        let params = ProcessingParams::new(
            Seconds(0.1),
            Hertz(5.0),
            FilterBand::Lowpass(Hertz(1.0)),
        )
        .unwrap();
        let ensemble = Ensemble::new(None, vec![station("sim", 0.01, 10.0)]);
        assert!(matches!(
            process(ensemble, &None::<Stamp>, &params),
            Err(DspError::DecimationLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_stamp_without_timing_is_rejected() {
        let ensemble = Ensemble::new(Some(station("obs", 0.02, 20.0)), vec![station("sim", 0.02, 20.0)]);
        assert!(matches!(
            process(ensemble, &Some(TimeOfDay::new(5.0, 0.0, 0.0)), &params()),
            Err(DspError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_params() {
        assert!(ProcessingParams::new(Seconds(0.0), Hertz(5.0), FilterBand::Lowpass(Hertz(1.0))).is_err());
        assert!(matches!(
            ProcessingParams::new(Seconds(0.02), Hertz(5.0), FilterBand::Lowpass(Hertz(30.0))),
            Err(DspError::InvalidFrequencyRange { .. })
        ));
        assert!(ProcessingParams::new(
            Seconds(0.02),
            Hertz(5.0),
            FilterBand::Bandpass(Hertz(2.0), Hertz(1.0))
        )
        .is_err());
        assert!(matches!(
            ProcessingParams::new(
                Seconds(0.02),
                Hertz(5.0),
                FilterBand::Bandpass(Hertz(2.0), Hertz(2.0))
            ),
            Err(DspError::InvalidFrequencyRange { .. })
        ));
        assert!(params().with_filter_order(0).validate().is_err());
    }

    #[test]
    fn test_empty_batch() {
        assert!(matches!(
            process(Ensemble::default(), &None::<Stamp>, &params()),
            Err(DspError::InsufficientData { .. })
        ));
    }
}
