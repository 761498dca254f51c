//! Output file writing and run summaries.

use crate::orchestrator::BatchResults;
use crate::OutputFormat;
use anyhow::{Context, Result};
use lib_bbp::write_bbp;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Prefix of files written by `process`.
pub const PROCESSED_PREFIX: &str = "p-";

/// Prefix of files written by `filter`.
pub const FILTERED_PREFIX: &str = "f-";

/// Output path for `input`: `<dir>/<prefix><file name>`.
pub fn output_path(output_dir: &Path, prefix: &str, input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a file path: {:?}", input))?;
    Ok(output_dir.join(format!("{}{}", prefix, name)))
}

#[derive(Debug, Serialize)]
pub struct StationSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub recorded: bool,
    pub samples: usize,
    pub dt: f64,
    /// Peak absolute amplitude per channel (N/S, E/W, U/D).
    pub peak: [f64; 3],
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub stations: Vec<StationSummary>,
    pub dropped: Vec<PathBuf>,
}

/// Write every station of a successful run, then describe what was written.
///
/// Each file is first written to a temporary file in `output_dir`; the
/// outputs only take their final names once every write has succeeded.
pub fn write_results(results: &BatchResults, output_dir: &Path, prefix: &str) -> Result<Summary> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let mut staged = Vec::with_capacity(results.stations.len());
    let mut stations = Vec::with_capacity(results.stations.len());
    for processed in &results.stations {
        let out = output_path(output_dir, prefix, &processed.source)?;
        let tmp = NamedTempFile::new_in(output_dir)
            .with_context(|| format!("Failed to create a temporary file in {:?}", output_dir))?;
        write_bbp(tmp.path(), &processed.header, &processed.station)
            .with_context(|| format!("Failed to write {}", out.display()))?;

        let [ns, ew, ud] = &processed.station.channels;
        stations.push(StationSummary {
            input: processed.source.clone(),
            output: out.clone(),
            recorded: processed.recorded,
            samples: processed.station.samples(),
            dt: processed.station.dt().0,
            peak: [ns.max_abs(), ew.max_abs(), ud.max_abs()],
        });
        staged.push((tmp, out));
    }

    for (tmp, out) in staged {
        tmp.persist(&out)
            .with_context(|| format!("Failed to move output into place at {}", out.display()))?;
        tracing::info!("Wrote {}", out.display());
    }

    Ok(Summary {
        stations,
        dropped: results.dropped.clone(),
    })
}

/// Print a summary to `out` in the requested format.
pub fn print_summary(summary: &Summary, format: OutputFormat, out: &mut impl Write) -> Result<()> {
    match format {
        OutputFormat::Text => {
            writeln!(out, "Processed {} station(s)", summary.stations.len())?;
            for s in &summary.stations {
                writeln!(
                    out,
                    "  {}{} -> {}: {} samples, dt={} s, peak N/S={:.4e} E/W={:.4e} U/D={:.4e}",
                    s.input.display(),
                    if s.recorded { " (recorded)" } else { "" },
                    s.output.display(),
                    s.samples,
                    s.dt,
                    s.peak[0],
                    s.peak[1],
                    s.peak[2]
                )?;
            }
            for d in &summary.dropped {
                writeln!(out, "  dropped: {}", d.display())?;
            }
        }
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
        }
        OutputFormat::Csv => {
            writeln!(out, "input,output,recorded,samples,dt,peak_ns,peak_ew,peak_ud")?;
            for s in &summary.stations {
                writeln!(
                    out,
                    "{},{},{},{},{},{},{},{}",
                    s.input.display(),
                    s.output.display(),
                    s.recorded,
                    s.samples,
                    s.dt,
                    s.peak[0],
                    s.peak[1],
                    s.peak[2]
                )?;
            }
        }
    }
    Ok(())
}
