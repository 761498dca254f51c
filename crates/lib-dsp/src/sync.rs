//! Time synchronization of recorded and simulated stations.
//!
//! Simulations start `leading` seconds before the earthquake origin, while a
//! recording starts at its own wall-clock stamp. The origin time ties the two
//! clocks together. Synchronization runs in four steps:
//!
//! 1. **Front alignment** (recorded station with a stamp only): cut or
//!    zero-pad the fronts so every station starts at the same instant; see
//!    [`FrontAlignment`].
//! 2. **Target duration**: the shortest station duration.
//! 3. **End alignment**: cut the excess from the end of longer channels.
//! 4. **Sample-count reconciliation**: channels exactly one sample short of
//!    the longest station get one trailing zero. Larger gaps are left for
//!    the caller to reject.
//!
//! Cut and pad lengths are converted from seconds with
//! `floor(t / dt + 1e-6)` samples.

use crate::error::{DspError, DspResult};
use crate::taper::{apply_taper, Edge};
use lib_types::station::{Ensemble, Station};
use lib_types::time::{EventTiming, Stamp};
use lib_types::timeseries::Timeseries;
use lib_types::units::Seconds;

/// Slack added before truncating a time span to whole samples.
const SAMPLE_EPSILON: f64 = 1e-6;

/// Where the recording starts relative to the simulation window, with the
/// front adjustments each ordering requires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrontAlignment {
    /// The recording starts before the simulations: cut the recorded front.
    RecordingBeforeSimulation { cut_recorded: Seconds },

    /// The recording starts after the earthquake origin: pad the recorded
    /// front up to the origin and cut the leading time from every simulation.
    RecordingAfterOrigin {
        pad_recorded: Seconds,
        cut_simulated: Seconds,
    },

    /// The recording starts within the leading time: pad the recorded front
    /// back to the simulation start.
    RecordingWithinLeading { pad_recorded: Seconds },
}

impl FrontAlignment {
    /// Classify a recording stamp against the event timing.
    pub fn classify(stamp: &Stamp, timing: &EventTiming) -> Self {
        let start = stamp.seconds_of_day();
        let eq_time = timing.origin_seconds();
        let sim_start = timing.sim_start_seconds();

        if start < sim_start {
            Self::RecordingBeforeSimulation {
                cut_recorded: sim_start - start,
            }
        } else if start > eq_time {
            Self::RecordingAfterOrigin {
                pad_recorded: start - eq_time,
                cut_simulated: eq_time - sim_start,
            }
        } else {
            Self::RecordingWithinLeading {
                pad_recorded: start - sim_start,
            }
        }
    }
}

/// Whole samples covered by a time span.
#[inline]
pub fn time_to_samples(span: Seconds, dt: Seconds) -> usize {
    if span.0 <= 0.0 {
        return 0;
    }
    (span / dt + SAMPLE_EPSILON).floor() as usize
}

/// Remove `span` seconds from one edge of a series.
pub fn cut(series: Timeseries, edge: Edge, span: Seconds) -> DspResult<Timeseries> {
    let count = time_to_samples(span, series.dt);
    if count == 0 {
        return Ok(series);
    }
    if count >= series.samples() {
        return Err(DspError::CutOutOfRange {
            edge: edge.as_str(),
            count,
            samples: series.samples(),
        });
    }
    Ok(match edge {
        Edge::Front => series.cut_front(count),
        Edge::End => series.cut_end(count),
    })
}

/// Taper the edge, then add `count` zeros to it.
pub fn pad_samples(mut series: Timeseries, edge: Edge, count: usize, taper: usize) -> Timeseries {
    if count == 0 {
        return series;
    }
    apply_taper(&mut series.data, edge, taper);
    match edge {
        Edge::Front => series.pad_front(count),
        Edge::End => series.pad_end(count),
    }
}

/// Taper the edge, then add `span` seconds of zeros to it.
pub fn pad(series: Timeseries, edge: Edge, span: Seconds, taper: usize) -> Timeseries {
    let count = time_to_samples(span, series.dt);
    pad_samples(series, edge, count, taper)
}

fn cut_station(station: Station, edge: Edge, span: Seconds) -> DspResult<Station> {
    tracing::debug!(
        "Cutting {:.3} s from the {} of '{}'",
        span.0,
        edge.as_str(),
        station.name
    );
    station.try_map_channels(|_, ts| cut(ts, edge, span))
}

fn pad_station(station: Station, edge: Edge, span: Seconds, taper: usize) -> Station {
    tracing::debug!(
        "Padding {:.3} s of zeros at the {} of '{}'",
        span.0,
        edge.as_str(),
        station.name
    );
    station.map_channels(|_, ts| pad(ts, edge, span, taper))
}

/// Step A: align the fronts of the recorded and simulated stations.
///
/// Only acts when both a recorded station and its stamp are present; the
/// event timing is then required.
pub fn align_front(
    ensemble: Ensemble,
    stamp: Option<&Stamp>,
    timing: Option<&EventTiming>,
    taper: usize,
) -> DspResult<Ensemble> {
    let Ensemble { recorded, simulated } = ensemble;

    let (recorded, stamp) = match (recorded, stamp) {
        (Some(recorded), Some(stamp)) => (recorded, stamp),
        (recorded, _) => {
            if recorded.is_some() {
                tracing::info!("No recording stamp available, fronts left unaligned");
            }
            return Ok(Ensemble { recorded, simulated });
        }
    };

    let timing = timing.ok_or_else(|| {
        DspError::InvalidConfig(
            "earthquake time and leading time are required to align recorded data".into(),
        )
    })?;

    let alignment = FrontAlignment::classify(stamp, timing);
    tracing::info!("Front alignment: {:?}", alignment);

    match alignment {
        FrontAlignment::RecordingBeforeSimulation { cut_recorded } => Ok(Ensemble {
            recorded: Some(cut_station(recorded, Edge::Front, cut_recorded)?),
            simulated,
        }),
        FrontAlignment::RecordingAfterOrigin {
            pad_recorded,
            cut_simulated,
        } => {
            let simulated = simulated
                .into_iter()
                .map(|s| cut_station(s, Edge::Front, cut_simulated))
                .collect::<DspResult<Vec<_>>>()?;
            Ok(Ensemble {
                recorded: Some(pad_station(recorded, Edge::Front, pad_recorded, taper)),
                simulated,
            })
        }
        FrontAlignment::RecordingWithinLeading { pad_recorded } => Ok(Ensemble {
            recorded: Some(pad_station(recorded, Edge::Front, pad_recorded, taper)),
            simulated,
        }),
    }
}

/// Step B: the shortest station duration, recorded included.
pub fn target_duration(ensemble: &Ensemble) -> Option<Seconds> {
    ensemble
        .stations()
        .map(Station::duration)
        .reduce(Seconds::min)
}

/// Step C: cut every channel longer than `target` back to it.
pub fn align_end(ensemble: Ensemble, target: Seconds) -> DspResult<Ensemble> {
    let trim = |station: Station| -> DspResult<Station> {
        let name = station.name.clone();
        station.try_map_channels(|component, ts| {
            let excess = ts.duration() - target;
            if excess.0 <= 0.0 {
                return Ok(ts);
            }
            tracing::trace!(
                "Cutting {:.3} s from the end of '{}' {}",
                excess.0,
                name,
                component.label()
            );
            cut(ts, Edge::End, excess)
        })
    };

    let Ensemble { recorded, simulated } = ensemble;
    Ok(Ensemble {
        recorded: recorded.map(trim).transpose()?,
        simulated: simulated.into_iter().map(trim).collect::<DspResult<Vec<_>>>()?,
    })
}

/// Step D: append one zero to channels exactly one sample short of the
/// longest station.
pub fn reconcile_sample_counts(ensemble: Ensemble, taper: usize) -> Ensemble {
    let Some(total) = ensemble.stations().map(Station::max_samples).max() else {
        return ensemble;
    };

    let fix = |station: Station| -> Station {
        let name = station.name.clone();
        station.map_channels(|component, ts| {
            if ts.samples() + 1 == total {
                tracing::debug!("Appending one sample to '{}' {}", name, component.label());
                pad_samples(ts, Edge::End, 1, taper)
            } else {
                ts
            }
        })
    };

    let Ensemble { recorded, simulated } = ensemble;
    Ensemble {
        recorded: recorded.map(fix),
        simulated: simulated.into_iter().map(fix).collect(),
    }
}

/// Synchronize start, end and length of every station in the ensemble.
pub fn synchronize(
    ensemble: Ensemble,
    stamp: Option<&Stamp>,
    timing: Option<&EventTiming>,
    taper: usize,
) -> DspResult<Ensemble> {
    if ensemble.is_empty() {
        return Err(DspError::InsufficientData { needed: 1, got: 0 });
    }

    let ensemble = align_front(ensemble, stamp, timing, taper)?;

    let target = target_duration(&ensemble).ok_or(DspError::InsufficientData { needed: 1, got: 0 })?;
    tracing::info!("Target duration: {:.3} s", target.0);

    let ensemble = align_end(ensemble, target)?;
    Ok(reconcile_sample_counts(ensemble, taper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::time::TimeOfDay;

    const DT: Seconds = Seconds(0.01);

    fn station(name: &str, seconds: f64, value: f64) -> Station {
        let n = (seconds / DT.0).round() as usize;
        let ch = Timeseries::new(vec![value; n], DT);
        Station::new(name, [ch.clone(), ch.clone(), ch])
    }

    fn timing(eq: (f64, f64, f64), leading: f64) -> EventTiming {
        EventTiming::new(TimeOfDay::new(eq.0, eq.1, eq.2), Seconds(leading))
    }

    #[test]
    fn test_classify_recording_within_leading() {
        let stamp = TimeOfDay::new(5.0, 0.0, 0.0);
        let alignment = FrontAlignment::classify(&stamp, &timing((5.0, 0.0, 10.0), 20.0));
        assert_eq!(
            alignment,
            FrontAlignment::RecordingWithinLeading { pad_recorded: Seconds(10.0) }
        );
    }

    #[test]
    fn test_classify_recording_before_simulation() {
        let stamp = TimeOfDay::new(4.0, 59.0, 0.0);
        let alignment = FrontAlignment::classify(&stamp, &timing((5.0, 0.0, 0.0), 30.0));
        assert_eq!(
            alignment,
            FrontAlignment::RecordingBeforeSimulation { cut_recorded: Seconds(30.0) }
        );
    }

    #[test]
    fn test_classify_recording_after_origin() {
        let stamp = TimeOfDay::new(5.0, 0.0, 5.0);
        let alignment = FrontAlignment::classify(&stamp, &timing((5.0, 0.0, 0.0), 10.0));
        assert_eq!(
            alignment,
            FrontAlignment::RecordingAfterOrigin {
                pad_recorded: Seconds(5.0),
                cut_simulated: Seconds(10.0),
            }
        );
    }

    #[test]
    fn test_classify_boundaries_fall_within_leading() {
        let t = timing((5.0, 0.0, 10.0), 20.0);
        for stamp in [TimeOfDay::new(4.0, 59.0, 50.0), TimeOfDay::new(5.0, 0.0, 10.0)] {
            assert!(matches!(
                FrontAlignment::classify(&stamp, &t),
                FrontAlignment::RecordingWithinLeading { .. }
            ));
        }
    }

    #[test]
    fn test_pad_recorded_front() {
        let ensemble = Ensemble::new(Some(station("obs", 30.0, 1.0)), vec![station("sim", 40.0, 2.0)]);
        let stamp = TimeOfDay::new(5.0, 0.0, 0.0);
        let t = timing((5.0, 0.0, 10.0), 20.0);

        let out = synchronize(ensemble, Some(&stamp), Some(&t), 20).unwrap();
        let rec = out.recorded.as_ref().unwrap();

        assert_eq!(rec.samples(), 4000);
        assert!(rec.channels[0].data[..1000].iter().all(|&v| v == 0.0));
        assert!(rec.channels[0].data[1000] < 1e-4);
        assert!(rec.channels[2].data[1021..].iter().all(|&v| v == 1.0));
        assert_eq!(out.simulated[0].samples(), 4000);
        assert!(out.simulated[0].channels[1].data.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_cut_recorded_front() {
        let mut rec = station("obs", 60.0, 0.0);
        for ch in rec.channels.iter_mut() {
            ch.data = (0..6000).map(|i| i as f64).collect();
        }
        let ensemble = Ensemble::new(Some(rec), vec![station("sim", 40.0, 1.0)]);
        let stamp = TimeOfDay::new(4.0, 59.0, 0.0);
        let t = timing((5.0, 0.0, 0.0), 30.0);

        let out = synchronize(ensemble, Some(&stamp), Some(&t), 20).unwrap();
        let rec = out.recorded.as_ref().unwrap();

        assert_eq!(rec.samples(), 3000);
        assert_eq!(rec.channels[0].data[0], 3000.0);
        assert_eq!(out.simulated[0].samples(), 3000);
    }

    #[test]
    fn test_recording_after_origin_cuts_simulations() {
        let ramp = |name: &str, seconds: f64| {
            let mut sim = station(name, seconds, 0.0);
            for ch in sim.channels.iter_mut() {
                ch.data = (0..ch.data.len()).map(|i| i as f64).collect();
            }
            sim
        };
        let ensemble = Ensemble::new(
            Some(station("obs", 20.0, 1.0)),
            vec![ramp("sim1", 40.0), ramp("sim2", 45.0)],
        );
        let stamp = TimeOfDay::new(5.0, 0.0, 5.0);
        let t = timing((5.0, 0.0, 0.0), 10.0);

        let out = synchronize(ensemble, Some(&stamp), Some(&t), 20).unwrap();

        assert_eq!(out.recorded.as_ref().unwrap().samples(), 2500);
        for sim in &out.simulated {
            assert_eq!(sim.samples(), 2500);
            for ch in &sim.channels {
                assert_eq!(ch.data[0], 1000.0);
                assert_eq!(ch.data[2499], 3499.0);
            }
        }
    }

    #[test]
    fn test_without_recorded_data_trims_to_shortest() {
        let ensemble = Ensemble::new(None, vec![station("a", 10.0, 1.0), station("b", 10.03, 1.0)]);
        let out = synchronize(ensemble, None, None, 20).unwrap();

        for sim in &out.simulated {
            assert_eq!(sim.samples(), 1000);
            assert!(sim.has_uniform_channels());
            assert!((sim.duration().0 - 10.0).abs() <= DT.0);
        }
    }

    #[test]
    fn test_stamp_requires_timing() {
        let ensemble = Ensemble::new(Some(station("obs", 10.0, 1.0)), vec![station("sim", 10.0, 1.0)]);
        let stamp = TimeOfDay::new(5.0, 0.0, 0.0);
        let result = synchronize(ensemble, Some(&stamp), None, 20);
        assert!(matches!(result, Err(DspError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_stamp_skips_front_alignment() {
        let ensemble = Ensemble::new(Some(station("obs", 12.0, 1.0)), vec![station("sim", 10.0, 1.0)]);
        let out = synchronize(ensemble, None, Some(&timing((5.0, 0.0, 0.0), 10.0)), 20).unwrap();
        assert_eq!(out.recorded.as_ref().unwrap().samples(), 1000);
        assert_eq!(out.recorded.as_ref().unwrap().channels[0].data[0], 1.0);
    }

    #[test]
    fn test_cut_out_of_range() {
        let ensemble = Ensemble::new(Some(station("obs", 5.0, 1.0)), vec![station("sim", 40.0, 1.0)]);
        let stamp = TimeOfDay::new(4.0, 59.0, 0.0);
        let t = timing((5.0, 0.0, 0.0), 30.0);
        let result = synchronize(ensemble, Some(&stamp), Some(&t), 20);
        assert!(matches!(result, Err(DspError::CutOutOfRange { .. })));
    }

    #[test]
    fn test_reconcile_off_by_one() {
        let dt = Seconds(0.02);
        let full = Timeseries::new(vec![1.0; 202], dt);
        let short = Timeseries::new(vec![1.0; 201], dt);
        let shorter = Timeseries::new(vec![1.0; 199], dt);

        let ensemble = Ensemble::new(
            Some(Station::new("obs", [full.clone(), full.clone(), full.clone()])),
            vec![
                Station::new("sim1", [short.clone(), short.clone(), short.clone()]),
                Station::new("sim2", [full.clone(), short, shorter]),
            ],
        );

        let out = reconcile_sample_counts(ensemble, 20);

        assert_eq!(out.recorded.as_ref().unwrap().samples(), 202);
        let sim1 = &out.simulated[0];
        assert!(sim1.channels.iter().all(|c| c.samples() == 202));
        assert_eq!(sim1.channels[0].data[201], 0.0);

        let sim2 = &out.simulated[1];
        assert_eq!(sim2.channels[0].data, full.data);
        assert_eq!(sim2.channels[1].samples(), 202);
        assert_eq!(sim2.channels[2].samples(), 199);
    }

    #[test]
    fn test_time_to_samples() {
        assert_eq!(time_to_samples(Seconds(10.0), Seconds(0.01)), 1000);
        assert_eq!(time_to_samples(Seconds(0.3), Seconds(0.1)), 3);
        assert_eq!(time_to_samples(Seconds(0.029), Seconds(0.01)), 2);
        assert_eq!(time_to_samples(Seconds(-1.0), Seconds(0.01)), 0);
    }
}
