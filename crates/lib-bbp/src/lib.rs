//! # lib-bbp
//!
//! Reader and writer for BBP seismogram files.
//!
//! A BBP file is plain text: header lines starting with `#` or `%`, then one
//! row per sample holding time and the N/S, E/W and U/D amplitudes. A header
//! line with `time=HH:MM:SS` records the absolute start of a recording.
//!
//! Data rows are parsed with `nom`.

pub mod error;
pub mod bbp;

pub use error::ParseError;
pub use bbp::{parse_bbp, parse_stamp, read_bbp, read_stamp, write_bbp, BbpFile};
