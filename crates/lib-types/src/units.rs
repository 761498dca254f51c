//! Physical units with type safety.
//!
//! These newtypes keep sampling intervals and frequencies apart so a cutoff
//! in Hz can never be passed where a `dt` in seconds is expected.

use serde::{Deserialize, Serialize};
use std::ops::{Div, Sub};

/// Time duration in seconds.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seconds(pub f64);

impl Seconds {
    pub const ZERO: Self = Self(0.0);

    /// Nyquist frequency for a sampling interval of this length.
    #[inline]
    pub fn nyquist(&self) -> Hertz {
        Hertz(0.5 / self.0)
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

impl Sub for Seconds {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Div<Seconds> for Seconds {
    type Output = f64;
    fn div(self, rhs: Seconds) -> f64 {
        self.0 / rhs.0
    }
}

/// Frequency in Hertz.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hertz(pub f64);

impl Hertz {
    pub const ZERO: Self = Self(0.0);
}
