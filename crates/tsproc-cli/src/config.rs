//! Command-line and file configuration.
//!
//! Values given on the command line override those read from `--config`.
//! Every validation failure is fatal.

use anyhow::{Context, Result};
use clap::Args;
use lib_dsp::filter::{FilterBand, DEFAULT_ORDER};
use lib_dsp::pipeline::ProcessingParams;
use lib_dsp::taper::DEFAULT_TAPER_SAMPLES;
use lib_dsp::validation::{DegenerateAction, InvalidSignalAction, ValidationPolicy};
use lib_types::time::{EventTiming, TimeOfDay};
use lib_types::units::{Hertz, Seconds};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Arguments of the `process` command.
#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// Input file containing recorded data
    #[arg(long)]
    pub obs: Option<PathBuf>,

    /// Leading time of the simulations (seconds)
    #[arg(long)]
    pub leading: Option<f64>,

    /// Earthquake origin time (HH:MM:SS[.sss])
    #[arg(long)]
    pub eq_time: Option<String>,

    /// Azimuth for rotation (degrees); no rotation when omitted
    #[arg(long, allow_hyphen_values = true)]
    pub azimuth: Option<f64>,

    /// Target dt for all processed signals (seconds)
    #[arg(long)]
    pub dt: Option<f64>,

    /// Maximum frequency preserved by decimation (Hz)
    #[arg(long)]
    pub decimation_freq: Option<f64>,

    /// Filter frequencies: "fmax" for lowpass, "fmin,fmax" for bandpass
    #[arg(long)]
    pub freqs: Option<String>,

    /// Output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Butterworth filter order
    #[arg(long)]
    pub filter_order: Option<usize>,

    /// Samples tapered before zero padding
    #[arg(long)]
    pub taper_samples: Option<usize>,

    /// What to do with a station that fails validation
    #[arg(long, value_enum)]
    pub on_invalid: Option<InvalidPolicy>,

    /// How to treat constant channels
    #[arg(long, value_enum)]
    pub on_degenerate: Option<DegeneratePolicy>,

    /// Simulated seismogram files
    pub inputs: Vec<PathBuf>,
}

/// Arguments of the `filter` command.
#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Lowest frequency to keep (Hz)
    #[arg(long)]
    pub lowf: Option<f64>,

    /// Highest frequency to keep (Hz)
    #[arg(long)]
    pub highf: Option<f64>,

    /// Butterworth filter order
    #[arg(long, default_value_t = DEFAULT_ORDER)]
    pub order: usize,

    /// Output directory
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Seismogram files to filter
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

/// Validation failure handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidPolicy {
    #[default]
    Abort,
    DropStation,
}

impl From<InvalidPolicy> for InvalidSignalAction {
    fn from(policy: InvalidPolicy) -> Self {
        match policy {
            InvalidPolicy::Abort => InvalidSignalAction::Abort,
            InvalidPolicy::DropStation => InvalidSignalAction::DropStation,
        }
    }
}

/// Constant channel handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    Ignore,
    #[default]
    Warn,
    Reject,
}

impl From<DegeneratePolicy> for DegenerateAction {
    fn from(policy: DegeneratePolicy) -> Self {
        match policy {
            DegeneratePolicy::Ignore => DegenerateAction::Ignore,
            DegeneratePolicy::Warn => DegenerateAction::Warn,
            DegeneratePolicy::Reject => DegenerateAction::Reject,
        }
    }
}

/// Contents of a `--config` file. Every field is optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub obs: Option<PathBuf>,
    pub leading: Option<f64>,
    pub eq_time: Option<String>,
    pub azimuth: Option<f64>,
    pub dt: Option<f64>,
    pub decimation_freq: Option<f64>,
    pub frequencies: Option<Vec<f64>>,
    pub output_dir: Option<PathBuf>,
    pub filter_order: Option<usize>,
    pub taper_samples: Option<usize>,
    pub on_invalid: Option<InvalidPolicy>,
    pub on_degenerate: Option<DegeneratePolicy>,
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
}

/// Load a configuration file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: FileConfig = if path.extension().map_or(false, |e| e == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config as JSON: {:?}", path))?
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config as TOML: {:?}", path))?
    };

    Ok(config)
}

/// Fully resolved `process` invocation.
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    pub obs: Option<PathBuf>,
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub params: ProcessingParams,
}

/// Fully resolved `filter` invocation.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub band: FilterBand,
    pub order: usize,
}

/// Merge command line and config file, then validate.
pub fn resolve_process(args: ProcessArgs) -> Result<ProcessConfig> {
    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let obs = args.obs.or(file.obs);
    let inputs = if args.inputs.is_empty() { file.inputs } else { args.inputs };

    if inputs.is_empty() || (inputs.len() == 1 && obs.is_none()) {
        anyhow::bail!("Please provide at least two timeseries to process");
    }
    check_output_names(obs.iter().chain(&inputs))?;

    let output_dir = args
        .output_dir
        .or(file.output_dir)
        .context("Please provide an output directory (--output-dir)")?;

    let frequencies = match args.freqs {
        Some(text) => parse_frequencies(&text)?,
        None => file
            .frequencies
            .context("Please provide the filter frequencies (--freqs)")?,
    };
    let band = FilterBand::from_frequencies(&frequencies).context("Invalid filter frequencies")?;

    let decimation_freq = args
        .decimation_freq
        .or(file.decimation_freq)
        .context("Please provide the maximum decimation frequency (--decimation-freq)")?;
    let dt = args
        .dt
        .or(file.dt)
        .context("Please provide a target dt for all signals (--dt)")?;

    let eq_time = args
        .eq_time
        .or(file.eq_time)
        .map(|text| {
            text.parse::<TimeOfDay>()
                .with_context(|| format!("Invalid earthquake time '{}'", text))
        })
        .transpose()?;
    let leading = args.leading.or(file.leading);

    let timing = match (eq_time, leading) {
        (Some(eq_time), Some(leading)) => Some(EventTiming::new(eq_time, Seconds(leading))),
        (None, None) => None,
        (None, Some(_)) => anyhow::bail!("Please provide the earthquake time (--eq-time)"),
        (Some(_), None) => anyhow::bail!("Please provide the simulation leading time (--leading)"),
    };
    if obs.is_some() && timing.is_none() {
        anyhow::bail!("Recorded data requires --eq-time and --leading");
    }

    let validation = ValidationPolicy {
        invalid_signal: args.on_invalid.or(file.on_invalid).unwrap_or_default().into(),
        degenerate: args.on_degenerate.or(file.on_degenerate).unwrap_or_default().into(),
    };

    let params = ProcessingParams::new(Seconds(dt), Hertz(decimation_freq), band)
        .context("Invalid processing parameters")?
        .with_azimuth(args.azimuth.or(file.azimuth))
        .with_timing(timing)
        .with_filter_order(args.filter_order.or(file.filter_order).unwrap_or(DEFAULT_ORDER))
        .with_taper_samples(
            args.taper_samples
                .or(file.taper_samples)
                .unwrap_or(DEFAULT_TAPER_SAMPLES),
        )
        .with_validation(validation);
    params.validate().context("Invalid processing parameters")?;

    Ok(ProcessConfig {
        obs,
        inputs,
        output_dir,
        params,
    })
}

/// Validate the `filter` command arguments.
pub fn resolve_filter(args: FilterArgs) -> Result<FilterConfig> {
    let band = FilterBand::from_bounds(args.lowf, args.highf)
        .context("Invalid filter bounds")?
        .context("Please provide --lowf and/or --highf")?;
    if args.order == 0 {
        anyhow::bail!("Filter order must be at least 1");
    }
    check_output_names(args.inputs.iter())?;

    Ok(FilterConfig {
        inputs: args.inputs,
        output_dir: args.output_dir,
        band,
        order: args.order,
    })
}

/// Parse "f1[,f2]" (commas or whitespace).
pub fn parse_frequencies(text: &str) -> Result<Vec<f64>> {
    let values = text
        .replace(',', " ")
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .with_context(|| format!("Invalid frequency '{}'", token))
        })
        .collect::<Result<Vec<_>>>()?;

    if values.is_empty() {
        anyhow::bail!("Invalid frequencies: '{}'", text);
    }
    Ok(values)
}

/// Outputs are named after their inputs; two inputs sharing a file name
/// would overwrite each other.
fn check_output_names<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> Result<()> {
    let mut seen = HashSet::new();
    for path in paths {
        let name = path
            .file_name()
            .with_context(|| format!("Not a file path: {:?}", path))?;
        if !seen.insert(name.to_owned()) {
            anyhow::bail!("Two inputs share the file name {:?}", name);
        }
    }
    Ok(())
}
