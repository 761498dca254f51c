//! Wall-clock times used to tie recordings to simulations.
//!
//! Recorded seismograms carry an absolute start time (the *stamp*), while
//! simulated ones only know their own clock, which starts `leading` seconds
//! before the earthquake origin. All arithmetic happens in seconds of day.

use crate::units::Seconds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors parsing an `HH:MM:SS[.sss]` time of day.
#[derive(Debug, Error, PartialEq)]
pub enum TimeParseError {
    /// Wrong number of `:` separated fields.
    #[error("expected HH:MM:SS, got '{0}'")]
    Format(String),

    /// A field is not a number.
    #[error("invalid number '{field}' in time '{input}'")]
    Number { field: String, input: String },

    /// A field is outside its range.
    #[error("time '{0}' is out of range")]
    Range(String),
}

/// Absolute time of day (hour, minute, second).
///
/// Used both for the recording stamp and the earthquake origin time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: f64,
    pub minute: f64,
    pub second: f64,
}

/// Absolute start time of a recorded station.
pub type Stamp = TimeOfDay;

impl TimeOfDay {
    pub fn new(hour: f64, minute: f64, second: f64) -> Self {
        Self { hour, minute, second }
    }

    /// Seconds elapsed since midnight.
    #[inline]
    pub fn seconds_of_day(&self) -> Seconds {
        Seconds(self.hour * 3600.0 + self.minute * 60.0 + self.second)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let fields: Vec<&str> = trimmed.split(':').collect();
        if fields.len() != 3 {
            return Err(TimeParseError::Format(trimmed.to_string()));
        }

        let mut values = [0.0; 3];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field.trim().parse::<f64>().map_err(|_| TimeParseError::Number {
                field: field.to_string(),
                input: trimmed.to_string(),
            })?;
        }

        let [hour, minute, second] = values;
        let in_range = (0.0..24.0).contains(&hour)
            && (0.0..60.0).contains(&minute)
            && (0.0..61.0).contains(&second);
        if !in_range {
            return Err(TimeParseError::Range(trimmed.to_string()));
        }

        Ok(Self::new(hour, minute, second))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:06.3}", self.hour, self.minute, self.second)
    }
}

/// Earthquake origin time plus the simulation's pre-origin buffer.
///
/// Constant for one pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventTiming {
    /// Earthquake origin time.
    pub eq_time: TimeOfDay,

    /// Simulated time before the origin included in every simulation.
    pub leading: Seconds,
}

impl EventTiming {
    pub fn new(eq_time: TimeOfDay, leading: Seconds) -> Self {
        Self { eq_time, leading }
    }

    /// Origin time in seconds of day.
    #[inline]
    pub fn origin_seconds(&self) -> Seconds {
        self.eq_time.seconds_of_day()
    }

    /// Wall-clock start of the simulations in seconds of day.
    #[inline]
    pub fn sim_start_seconds(&self) -> Seconds {
        self.origin_seconds() - self.leading
    }
}
