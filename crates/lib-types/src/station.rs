//! Three-component stations and the ensembles the pipeline operates on.

use crate::timeseries::Timeseries;
use crate::units::Seconds;
use serde::{Deserialize, Serialize};

/// Number of channels in every station.
pub const NUM_CHANNELS: usize = 3;

/// Fixed channel slots of a station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// First horizontal channel (N/S, or radial after rotation).
    NorthSouth = 0,
    /// Second horizontal channel (E/W, or transverse after rotation).
    EastWest = 1,
    /// Vertical channel.
    UpDown = 2,
}

impl Component {
    pub fn label(self) -> &'static str {
        match self {
            Component::NorthSouth => "N/S",
            Component::EastWest => "E/W",
            Component::UpDown => "U/D",
        }
    }
}

/// One recording location for one run: three channels of motion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Identity of the source (usually the input file name).
    pub name: String,

    /// Channels indexed by [`Component`].
    pub channels: [Timeseries; NUM_CHANNELS],
}

impl Station {
    pub fn new(name: impl Into<String>, channels: [Timeseries; NUM_CHANNELS]) -> Self {
        Self {
            name: name.into(),
            channels,
        }
    }

    /// The two horizontal channels.
    #[inline]
    pub fn horizontal(&self) -> (&Timeseries, &Timeseries) {
        (&self.channels[0], &self.channels[1])
    }

    #[inline]
    pub fn vertical(&self) -> &Timeseries {
        &self.channels[2]
    }

    /// Sample count of the first channel.
    #[inline]
    pub fn samples(&self) -> usize {
        self.channels[0].samples()
    }

    /// Sampling interval of the first channel.
    #[inline]
    pub fn dt(&self) -> Seconds {
        self.channels[0].dt
    }

    /// Duration of the first channel.
    #[inline]
    pub fn duration(&self) -> Seconds {
        self.channels[0].duration()
    }

    /// Largest sample count over the channels.
    pub fn max_samples(&self) -> usize {
        self.channels.iter().map(Timeseries::samples).max().unwrap_or(0)
    }

    /// Whether all channels share sample count and interval.
    pub fn has_uniform_channels(&self) -> bool {
        let first = &self.channels[0];
        self.channels
            .iter()
            .all(|c| c.samples() == first.samples() && c.dt == first.dt)
    }

    /// Replace every channel through a fallible transform.
    pub fn try_map_channels<E, F>(self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(Component, Timeseries) -> Result<Timeseries, E>,
    {
        let Station { name, channels } = self;
        let [ns, ew, ud] = channels;
        Ok(Station {
            name,
            channels: [
                f(Component::NorthSouth, ns)?,
                f(Component::EastWest, ew)?,
                f(Component::UpDown, ud)?,
            ],
        })
    }

    /// Replace every channel through an infallible transform.
    pub fn map_channels<F>(self, mut f: F) -> Self
    where
        F: FnMut(Component, Timeseries) -> Timeseries,
    {
        let Station { name, channels } = self;
        let [ns, ew, ud] = channels;
        Station {
            name,
            channels: [
                f(Component::NorthSouth, ns),
                f(Component::EastWest, ew),
                f(Component::UpDown, ud),
            ],
        }
    }
}

/// An optional recorded station plus the simulated stations it is compared
/// against. Every pipeline stage consumes and returns an ensemble.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub recorded: Option<Station>,
    pub simulated: Vec<Station>,
}

impl Ensemble {
    pub fn new(recorded: Option<Station>, simulated: Vec<Station>) -> Self {
        Self { recorded, simulated }
    }

    /// Total number of stations, recorded included.
    pub fn len(&self) -> usize {
        self.simulated.len() + usize::from(self.recorded.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stations, recorded first.
    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.recorded.iter().chain(self.simulated.iter())
    }
}
