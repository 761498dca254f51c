//! Validation gate for processed stations.

use crate::error::{DspError, DspResult};
use lib_types::station::{Ensemble, Station};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Absolute spread under which a channel counts as constant.
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// What to do with a station the gate rejects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidSignalAction {
    /// Abort the whole batch.
    #[default]
    Abort,
    /// Remove the station and carry on with the rest.
    DropStation,
}

/// How to treat a constant channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegenerateAction {
    Ignore,
    #[default]
    Warn,
    Reject,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    #[serde(default)]
    pub invalid_signal: InvalidSignalAction,
    #[serde(default)]
    pub degenerate: DegenerateAction,
}

fn invalid(station: &Station, reason: String) -> DspError {
    DspError::InvalidSignal {
        station: station.name.clone(),
        reason,
    }
}

/// Check one station.
///
/// Rejects empty or non-finite channels and channels that disagree in sample
/// count or interval. Constant channels are handled per `degenerate`.
pub fn check(station: &Station, degenerate: DegenerateAction) -> DspResult<()> {
    let first = &station.channels[0];

    for (index, channel) in station.channels.iter().enumerate() {
        if channel.is_empty() {
            return Err(invalid(station, format!("channel {} is empty", index)));
        }
        if !channel.is_finite() {
            return Err(invalid(station, format!("channel {} has non-finite samples", index)));
        }
        if channel.samples() != first.samples() {
            return Err(invalid(
                station,
                format!(
                    "channel {} has {} samples, channel 0 has {}",
                    index,
                    channel.samples(),
                    first.samples()
                ),
            ));
        }
        if channel.dt != first.dt {
            return Err(invalid(
                station,
                format!("channel {} has dt {} s, channel 0 has {} s", index, channel.dt.0, first.dt.0),
            ));
        }
    }

    for (index, channel) in station.channels.iter().enumerate() {
        if !channel.is_constant(DEGENERATE_TOLERANCE) {
            continue;
        }
        match degenerate {
            DegenerateAction::Ignore => {}
            DegenerateAction::Warn => {
                tracing::warn!("Station '{}' channel {} is constant", station.name, index);
            }
            DegenerateAction::Reject => {
                return Err(invalid(station, format!("channel {} is constant", index)));
            }
        }
    }

    Ok(())
}

/// Boolean form of [`check`].
pub fn is_valid(station: &Station, degenerate: DegenerateAction) -> bool {
    check(station, degenerate).is_ok()
}

/// Run the gate over every station of an ensemble.
///
/// With [`InvalidSignalAction::DropStation`] rejected stations are removed;
/// the batch still fails when no simulated station survives.
pub fn validate_ensemble(ensemble: Ensemble, policy: &ValidationPolicy) -> DspResult<Ensemble> {
    let Ensemble { recorded, simulated } = ensemble;

    let recorded = match recorded {
        Some(station) => gate(station, policy)?,
        None => None,
    };

    let checked: Vec<DspResult<Option<Station>>> =
        simulated.into_par_iter().map(|s| gate(s, policy)).collect();

    let mut kept = Vec::with_capacity(checked.len());
    for result in checked {
        if let Some(station) = result? {
            kept.push(station);
        }
    }

    if kept.is_empty() {
        return Err(DspError::InsufficientData { needed: 1, got: 0 });
    }

    Ok(Ensemble::new(recorded, kept))
}

fn gate(station: Station, policy: &ValidationPolicy) -> DspResult<Option<Station>> {
    match check(&station, policy.degenerate) {
        Ok(()) => Ok(Some(station)),
        Err(err) => match policy.invalid_signal {
            InvalidSignalAction::Abort => Err(err),
            InvalidSignalAction::DropStation => {
                tracing::warn!("Dropping station: {}", err);
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::timeseries::Timeseries;
    use lib_types::units::Seconds;

    fn station(name: &str) -> Station {
        let dt = Seconds(0.01);
        let ch = |phase: f64| {
            Timeseries::new((0..100).map(|i| (i as f64 * 0.1 + phase).sin()).collect(), dt)
        };
        Station::new(name, [ch(0.0), ch(1.0), ch(2.0)])
    }

    #[test]
    fn test_valid_station() {
        assert!(is_valid(&station("a"), DegenerateAction::Reject));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut sta = station("a");
        sta.channels[1].data[17] = f64::NAN;
        assert!(matches!(
            check(&sta, DegenerateAction::Ignore),
            Err(DspError::InvalidSignal { .. })
        ));

        sta.channels[1].data[17] = f64::INFINITY;
        assert!(!is_valid(&sta, DegenerateAction::Ignore));
    }

    #[test]
    fn test_unequal_channels_rejected() {
        let mut sta = station("a");
        sta.channels[2].data.pop();
        assert!(!is_valid(&sta, DegenerateAction::Ignore));

        let mut sta = station("a");
        sta.channels[2].dt = Seconds(0.02);
        assert!(!is_valid(&sta, DegenerateAction::Ignore));
    }

    #[test]
    fn test_degenerate_policy() {
        let mut sta = station("a");
        sta.channels[2] = Timeseries::zeros(100, Seconds(0.01));

        assert!(is_valid(&sta, DegenerateAction::Ignore));
        assert!(is_valid(&sta, DegenerateAction::Warn));
        assert!(!is_valid(&sta, DegenerateAction::Reject));
    }

    #[test]
    fn test_abort_policy() {
        let mut bad = station("bad");
        bad.channels[0].data[0] = f64::NAN;
        let ensemble = Ensemble::new(None, vec![station("good"), bad]);

        let err = validate_ensemble(ensemble, &ValidationPolicy::default()).unwrap_err();
        assert_eq!(err.station(), Some("bad"));
    }

    #[test]
    fn test_drop_station_policy() {
        let mut bad = station("bad");
        bad.channels[0].data[0] = f64::NAN;
        let policy = ValidationPolicy {
            invalid_signal: InvalidSignalAction::DropStation,
            ..Default::default()
        };

        let ensemble = Ensemble::new(Some(station("obs")), vec![station("good"), bad.clone()]);
        let out = validate_ensemble(ensemble, &policy).unwrap();
        assert_eq!(out.simulated.len(), 1);
        assert_eq!(out.simulated[0].name, "good");
        assert!(out.recorded.is_some());

        let ensemble = Ensemble::new(None, vec![bad]);
        assert!(matches!(
            validate_ensemble(ensemble, &policy),
            Err(DspError::InsufficientData { .. })
        ));
    }
}
