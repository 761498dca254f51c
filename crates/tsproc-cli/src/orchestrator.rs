//! Batch orchestration: read, process, hand over for writing.

use crate::config::{FilterConfig, ProcessConfig};
use anyhow::{Context, Result};
use lib_bbp::{read_bbp, read_stamp, BbpFile};
use lib_dsp::error::{DspError, DspResult};
use lib_dsp::pipeline::{filter_ensemble, process, StampSource};
use lib_types::station::{Ensemble, Station};
use lib_types::time::Stamp;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Reads the recording stamp from the header of the recorded file.
struct BbpStampSource<'a> {
    path: &'a Path,
}

impl StampSource for BbpStampSource<'_> {
    fn recording_stamp(&self) -> DspResult<Option<Stamp>> {
        read_stamp(self.path)
            .map_err(|e| DspError::StampUnavailable(format!("{}: {}", self.path.display(), e)))
    }
}

/// One processed station with the file it came from.
#[derive(Clone, Debug)]
pub struct Processed {
    pub source: PathBuf,
    pub header: Vec<String>,
    pub station: Station,
    pub recorded: bool,
}

/// Everything a successful run produced.
#[derive(Clone, Debug, Default)]
pub struct BatchResults {
    pub stations: Vec<Processed>,

    /// Inputs removed by the validation gate.
    pub dropped: Vec<PathBuf>,
}

/// Origin of every station by name; names are unique file names.
struct Sources {
    by_name: HashMap<String, (PathBuf, Vec<String>)>,
    order: Vec<String>,
}

impl Sources {
    fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn load(&mut self, path: &Path) -> Result<Station> {
        tracing::info!("Reading {}", path.display());
        let BbpFile { header, station } =
            read_bbp(path).with_context(|| format!("Failed to read {}", path.display()))?;
        self.order.push(station.name.clone());
        self.by_name
            .insert(station.name.clone(), (path.to_path_buf(), header));
        Ok(station)
    }

    fn attach(&mut self, ensemble: Ensemble) -> Result<BatchResults> {
        let mut results = BatchResults::default();
        let Ensemble { recorded, simulated } = ensemble;

        let tagged = recorded
            .into_iter()
            .map(|s| (s, true))
            .chain(simulated.into_iter().map(|s| (s, false)));
        for (station, recorded) in tagged {
            let (source, header) = self
                .by_name
                .remove(&station.name)
                .with_context(|| format!("Processed station '{}' has no source file", station.name))?;
            results.stations.push(Processed {
                source,
                header,
                station,
                recorded,
            });
        }

        for name in &self.order {
            if let Some((source, _)) = self.by_name.remove(name) {
                results.dropped.push(source);
            }
        }
        Ok(results)
    }
}

/// Runs the `process` command.
pub struct Orchestrator {
    config: ProcessConfig,
}

impl Orchestrator {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Read every input and run the pipeline. Nothing is written here.
    pub fn run(&self) -> Result<BatchResults> {
        let mut sources = Sources::new();

        let recorded = self
            .config
            .obs
            .as_deref()
            .map(|path| sources.load(path))
            .transpose()?;
        let simulated = self
            .config
            .inputs
            .iter()
            .map(|path| sources.load(path))
            .collect::<Result<Vec<_>>>()?;

        let ensemble = Ensemble::new(recorded, simulated);
        let stamps: Option<BbpStampSource> = self.config.obs.as_deref().map(|path| BbpStampSource { path });

        let processed = match &stamps {
            Some(source) => process(ensemble, source, &self.config.params),
            None => process(ensemble, &None::<Stamp>, &self.config.params),
        }
        .context("Processing failed")?;

        let results = sources.attach(processed)?;
        for dropped in &results.dropped {
            tracing::warn!("{} was dropped by validation", dropped.display());
        }
        Ok(results)
    }
}

/// Run the `filter` command over every input.
pub fn run_filter(config: &FilterConfig) -> Result<BatchResults> {
    let mut sources = Sources::new();
    let stations = config
        .inputs
        .iter()
        .map(|path| sources.load(path))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!("Filtering {} file(s) with {}", stations.len(), config.band);
    let filtered = filter_ensemble(Ensemble::new(None, stations), config.band, config.order)
        .context("Filtering failed")?;

    sources.attach(filtered)
}
