//! BBP seismogram files.
//!
//! ```text
//! # Station: sta01
//! # time= 2019/07/06,03:19:53.040
//! #     time(s)      N-S        E-W        U-D
//! 0.000000 1.2e-3 -4.0e-4 2.2e-4
//! 0.010000 1.3e-3 -3.9e-4 2.1e-4
//! ```
//!
//! The sampling interval comes from the time column, which must be uniform.

use crate::error::ParseError;
use lib_types::station::{Station, NUM_CHANNELS};
use lib_types::time::Stamp;
use lib_types::timeseries::Timeseries;
use lib_types::units::Seconds;
use nom::{
    bytes::complete::{tag, take_until, take_while1},
    character::complete::space0,
    combinator::all_consuming,
    multi::many1,
    number::complete::double,
    sequence::preceded,
    IResult, Parser,
};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Time column plus one column per channel.
const COLUMNS: usize = 1 + NUM_CHANNELS;

/// Relative deviation allowed between consecutive time steps.
const DT_TOLERANCE: f64 = 1e-3;

/// Header line appended to every file this crate writes.
pub const PROCESSED_MARKER: &str = "# processed by ts-process";

/// A parsed BBP file.
#[derive(Clone, Debug, PartialEq)]
pub struct BbpFile {
    /// Header lines, verbatim.
    pub header: Vec<String>,

    /// Channels in N/S, E/W, U/D order.
    pub station: Station,
}

impl BbpFile {
    /// Recording start time from the header, if present.
    pub fn stamp(&self) -> Result<Option<Stamp>, ParseError> {
        parse_stamp(&self.header)
    }
}

/// Parse BBP content. `name` becomes the station name.
pub fn parse_bbp(content: &str, name: &str) -> Result<BbpFile, ParseError> {
    let mut header = Vec::new();
    let mut times = Vec::new();
    let mut channels: [Vec<f64>; NUM_CHANNELS] = Default::default();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if is_header(line) {
            header.push(raw.trim_end().to_string());
            continue;
        }

        let (_, values) = data_row(line).map_err(|_| {
            ParseError::syntax(index + 1, format!("expected {} numbers, got '{}'", COLUMNS, line))
        })?;
        if values.len() != COLUMNS {
            return Err(ParseError::syntax(
                index + 1,
                format!("expected {} columns, got {}", COLUMNS, values.len()),
            ));
        }

        times.push(values[0]);
        for (channel, value) in channels.iter_mut().zip(&values[1..]) {
            channel.push(*value);
        }
    }

    if times.len() < 2 {
        return Err(ParseError::InvalidFormat(format!(
            "'{}' has {} data rows, at least 2 are needed",
            name,
            times.len()
        )));
    }

    let dt = sample_interval(&times)?;
    let [ns, ew, ud] = channels;
    let station = Station::new(
        name,
        [
            Timeseries::new(ns, dt),
            Timeseries::new(ew, dt),
            Timeseries::new(ud, dt),
        ],
    );

    tracing::debug!(
        "Parsed '{}': {} samples at dt={} s, {} header lines",
        name,
        station.samples(),
        dt.0,
        header.len()
    );

    Ok(BbpFile { header, station })
}

/// Read a BBP file; the station is named after the file.
pub fn read_bbp(path: &Path) -> Result<BbpFile, ParseError> {
    let content = fs::read_to_string(path)?;
    parse_bbp(&content, &station_name(path))
}

/// Recording start time from header lines.
///
/// Looks for `time=` followed by `[date,]HH:MM:SS[.sss]`. Returns `None` when
/// no header line carries one.
pub fn parse_stamp<S: AsRef<str>>(header: &[S]) -> Result<Option<Stamp>, ParseError> {
    for line in header {
        if let Ok((_, field)) = stamp_field(line.as_ref()) {
            let time = field.rsplit(',').next().unwrap_or(field);
            return Ok(Some(time.parse::<Stamp>()?));
        }
    }
    Ok(None)
}

/// Read only the recording start time of a BBP file.
pub fn read_stamp(path: &Path) -> Result<Option<Stamp>, ParseError> {
    let content = fs::read_to_string(path)?;
    let header: Vec<&str> = content.lines().filter(|l| is_header(l.trim())).collect();
    let stamp = parse_stamp(&header)?;
    tracing::debug!("Stamp of {}: {:?}", path.display(), stamp);
    Ok(stamp)
}

/// Write a station as BBP, keeping `header` and marking the file processed.
pub fn write_bbp<S: AsRef<str>>(path: &Path, header: &[S], station: &Station) -> Result<(), ParseError> {
    if !station.has_uniform_channels() {
        return Err(ParseError::InvalidFormat(format!(
            "station '{}' has channels of different length or dt",
            station.name
        )));
    }

    let mut out = BufWriter::new(fs::File::create(path)?);

    let mut marked = false;
    for line in header {
        let line = line.as_ref();
        marked |= line == PROCESSED_MARKER;
        writeln!(out, "{}", line)?;
    }
    if !marked {
        writeln!(out, "{}", PROCESSED_MARKER)?;
    }

    let dt = station.dt().0;
    let [ns, ew, ud] = &station.channels;
    for (i, ((n, e), u)) in ns.data.iter().zip(&ew.data).zip(&ud.data).enumerate() {
        writeln!(out, "{:.6} {:.9e} {:.9e} {:.9e}", i as f64 * dt, n, e, u)?;
    }
    out.flush()?;

    tracing::debug!("Wrote {} samples to {}", station.samples(), path.display());
    Ok(())
}

fn station_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn is_header(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('%')
}

/// Mean spacing of the time column, checked for uniformity.
fn sample_interval(times: &[f64]) -> Result<Seconds, ParseError> {
    let span = times[times.len() - 1] - times[0];
    let dt = span / (times.len() - 1) as f64;
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(ParseError::invalid_value(
            "dt",
            format!("time column must increase, got step {}", dt),
        ));
    }

    for (i, pair) in times.windows(2).enumerate() {
        let step = pair[1] - pair[0];
        if ((step - dt) / dt).abs() > DT_TOLERANCE {
            return Err(ParseError::InvalidFormat(format!(
                "non-uniform time step after sample {}: {} s, expected {} s",
                i, step, dt
            )));
        }
    }
    Ok(Seconds(dt))
}

// ============================================================================
// Nom Parsers (nom 8 compatible)
// ============================================================================

fn data_row(input: &str) -> IResult<&str, Vec<f64>> {
    all_consuming((many1(preceded(space0, double)), space0))
        .map(|(values, _)| values)
        .parse(input)
}

fn stamp_field(input: &str) -> IResult<&str, &str> {
    let (input, _) = take_until("time=")(input)?;
    let (input, _) = tag("time=")(input)?;
    let (input, _) = space0(input)?;
    take_while1(|c: char| !c.is_whitespace())(input)
}
