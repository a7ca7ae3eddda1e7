// AgriSim CLI - Command-line driver for the telemetry generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # AgriSim CLI
//!
//! Generates synthetic farm telemetry to a file or stdout.
//!
//! ## Usage
//!
//! ```bash
//! # One year of minute data for five farms, CSV on stdout
//! agrisim-cli generate > farm_telemetry.csv
//!
//! # Ten farms, one day, JSON Lines, with a dataset manifest
//! agrisim-cli generate --farms 10 --steps 1440 --format jsonl \
//!     --output day.jsonl --manifest day.manifest.json
//!
//! # Print the default roster, edit it, feed it back through a config file
//! agrisim-cli roster --farms 3
//! ```

use agrisim::{
    drive, parse_timestamp, CsvSink, GenerationConfig, JsonLinesSink, RecordSink, Roster,
    RunManifest, RunSummary, SimError, SinkError, Simulator,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// AgriSim telemetry generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a telemetry dataset
    Generate(GenerateArgs),
    /// Print the default farm roster as JSON
    Roster {
        /// Number of farms
        #[arg(short, long, default_value_t = agrisim::config::DEFAULT_FARM_COUNT)]
        farms: usize,
    },
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Number of farms in the default roster (replaces the config roster)
    #[arg(short, long)]
    farms: Option<usize>,

    /// JSON generation config; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start of the horizon, e.g. 2024-01-01T00:00
    #[arg(long)]
    start: Option<String>,

    /// Number of time steps [default: 525600]
    #[arg(long)]
    steps: Option<usize>,

    /// Step size in seconds [default: 60]
    #[arg(long)]
    step_secs: Option<u64>,

    /// Random seed [default: 42]
    #[arg(long)]
    seed: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a JSON manifest with the run summary
    #[arg(short, long)]
    manifest: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Format {
    #[default]
    Csv,
    Jsonl,
}

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("Output error: {0}")]
    Sink(#[from] SinkError),

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing on stderr; stdout carries data only
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match cli.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let outcome = match cli.command {
        Command::Generate(args) => run_generate(&args),
        Command::Roster { farms } => print_roster(farms),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Merge the optional config file with command-line overrides.
fn build_config(args: &GenerateArgs) -> Result<GenerationConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => GenerationConfig::from_json_file(path)?,
        None => GenerationConfig::default(),
    };

    if let Some(farms) = args.farms {
        config = config.with_roster(Roster::default_farms(farms));
    }
    if let Some(start) = &args.start {
        config = config.with_start(parse_timestamp(start)?);
    }
    if let Some(steps) = args.steps {
        config = config.with_step_count(steps);
    }
    if let Some(secs) = args.step_secs {
        config = config.with_step_secs(secs);
    }
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    config.validate()?;
    Ok(config)
}

fn run_generate(args: &GenerateArgs) -> Result<(), CliError> {
    let config = build_config(args)?;

    info!("AgriSim v{}", agrisim::VERSION);
    info!(
        "Generating {} records: {} farms x {} steps of {}s from {} (seed {})",
        config.expected_records(),
        config.roster.len(),
        config.step_count,
        config.step_secs,
        config.start,
        config.seed
    );

    let simulator = Simulator::new(&config)?;
    let summary = match &args.output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path).map_err(|source| CliError::Write {
                path: path.clone(),
                source,
            })?);
            write_records(simulator, writer, args.format)?
        }
        None => write_records(simulator, io::stdout().lock(), args.format)?,
    };

    info!(
        "Done: {} records, {} rain events, {} pesticide applications",
        summary.total_records, summary.rain_events, summary.pesticide_applications
    );

    if let Some(path) = &args.manifest {
        let name = dataset_name(args.output.as_deref());
        RunManifest::new(&name, &config, summary)
            .to_json_file(path)
            .map_err(|source| CliError::Write {
                path: path.clone(),
                source,
            })?;
        info!("Manifest written to {}", path.display());
    }

    Ok(())
}

fn write_records<W: Write + 'static>(
    simulator: Simulator,
    writer: W,
    format: Format,
) -> Result<RunSummary, CliError> {
    let mut sink: Box<dyn RecordSink> = match format {
        Format::Csv => Box::new(CsvSink::new(writer)?),
        Format::Jsonl => Box::new(JsonLinesSink::new(writer)),
    };
    Ok(drive(simulator, sink.as_mut())?)
}

fn dataset_name(output: Option<&Path>) -> String {
    output
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "agrisim".to_string())
}

fn print_roster(farms: usize) -> Result<(), CliError> {
    let roster = Roster::default_farms(farms);
    roster.validate()?;
    println!("{}", serde_json::to_string_pretty(&roster)?);
    Ok(())
}
