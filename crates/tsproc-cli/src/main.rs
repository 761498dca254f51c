//! ts-process: prepares recorded and simulated seismograms for comparison.
//!
//! Rotates, resamples, synchronizes and filters a batch of BBP files so that
//! every output shares orientation, sampling, time window and frequency band.

mod config;
mod orchestrator;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{FilterArgs, ProcessArgs};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ts-process")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Summary format
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate, resample, synchronize and filter a batch of seismograms
    Process(ProcessArgs),

    /// Filter seismograms to a frequency band
    Filter(FilterArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Process(args) => run_process(args, cli.format),
        Commands::Filter(args) => run_filter(args, cli.format),
    }
}

fn run_process(args: ProcessArgs, format: OutputFormat) -> Result<()> {
    let config = config::resolve_process(args)?;
    let orchestrator = orchestrator::Orchestrator::new(config);

    let results = orchestrator.run()?;

    let output_dir = &orchestrator.config().output_dir;
    let summary = output::write_results(&results, output_dir, output::PROCESSED_PREFIX)?;
    output::print_summary(&summary, format, &mut std::io::stdout().lock())?;

    tracing::info!("Processing complete. Results written to {:?}", output_dir);
    Ok(())
}

fn run_filter(args: FilterArgs, format: OutputFormat) -> Result<()> {
    let config = config::resolve_filter(args)?;

    let results = orchestrator::run_filter(&config)?;

    let summary = output::write_results(&results, &config.output_dir, output::FILTERED_PREFIX)?;
    output::print_summary(&summary, format, &mut std::io::stdout().lock())?;

    tracing::info!("Filtering complete. Results written to {:?}", config.output_dir);
    Ok(())
}
