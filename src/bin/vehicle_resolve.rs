//! vehicle-resolve
//!
//! Resolves one vehicle's observations from a JSON file and prints the
//! resolution report as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vehicle_resolver::{
    ProvenanceStore, ResolutionEngine, ResolveError, ResolverConfig, VehicleObservations,
};

/// Command-line options
struct Options {
    /// Observation file
    input: PathBuf,
    /// Optional configuration file
    config: Option<PathBuf>,
    /// Optional SQLite provenance database
    db: Option<PathBuf>,
    /// Prefer a report built from stored provenance
    cached: bool,
}

fn usage() {
    println!("vehicle-resolve - Vehicle attribute resolution");
    println!();
    println!("USAGE:");
    println!("    vehicle-resolve --input <FILE> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -i, --input <FILE>     Observation JSON file");
    println!("    -c, --config <FILE>    Resolver configuration JSON");
    println!("    -d, --db <PATH>        SQLite provenance database [default: in-memory]");
    println!("        --cached           Print the stored report when one exists");
    println!("    -h, --help             Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG               Log filter [default: info]");
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut input = None;
    let mut config = None;
    let mut db = None;
    let mut cached = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--input" | "-i" | "--config" | "-c" | "--db" | "-d" => {
                let Some(value) = args.get(i + 1) else {
                    return Err(format!("{flag} requires a value"));
                };
                let value = PathBuf::from(value);
                match flag {
                    "--input" | "-i" => input = Some(value),
                    "--config" | "-c" => config = Some(value),
                    _ => db = Some(value),
                }
                i += 2;
            }
            "--cached" => {
                cached = true;
                i += 1;
            }
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    let input = input.ok_or_else(|| "--input is required".to_string())?;
    Ok(Options {
        input,
        config,
        db,
        cached,
    })
}

fn run(options: &Options) -> Result<String, ResolveError> {
    let config = match &options.config {
        Some(path) => ResolverConfig::from_path(path)?,
        None => ResolverConfig::default(),
    };
    let store = match &options.db {
        Some(path) => {
            info!(path = %path.display(), "Opening provenance database");
            ProvenanceStore::sqlite(path)?
        }
        None => ProvenanceStore::in_memory(),
    };
    let engine = ResolutionEngine::from_config(config, Arc::new(store))?;

    let observations = VehicleObservations::from_path(&options.input)?;
    let vehicle = observations.vehicle()?;

    let stored = if options.cached {
        engine.cached_report(&vehicle)
    } else {
        None
    };
    let report = match stored {
        Some(report) => {
            info!(vehicle = %vehicle, "Serving stored report");
            report
        }
        None => engine.resolve_vehicle(&vehicle, &observations),
    };

    serde_json::to_string_pretty(&report).map_err(|source| ResolveError::Parse {
        what: "resolution report".to_string(),
        source,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("run with --help for usage");
            return ExitCode::from(2);
        }
    };

    match run(&options) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Resolution failed");
            ExitCode::FAILURE
        }
    }
}
