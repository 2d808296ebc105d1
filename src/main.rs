use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sfi::construct::{Database, FactVector};
use sfi::error::{Result, SfiError};
use sfi::interface::{Envelope, FactInterface};
use sfi::query::QueryCriteria;
use sfi::server;
use sfi::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "sfi", version, about = "Manage and query prime-encoded shipment data")]
struct Cli {
    /// Settings file, `sfi.toml` in the working directory is used when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the prime assigned to every attribute value.
    Primes,
    /// Generate sample shipments, replacing the stored ones.
    Generate {
        #[arg(short, long)]
        count: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Filter stored shipments, e.g. --criteria '{"origin": "New York", "status": "In Transit"}'.
    Filter {
        #[arg(long)]
        criteria: String,
        /// Decode the matching shipments as well.
        #[arg(long)]
        details: bool,
    },
    /// Decode a fact vector.
    Decode {
        #[arg(short, long)]
        vector: String,
    },
    /// Find the assignment of a value, or the value of a prime.
    Lookup {
        #[arg(long, conflicts_with_all = ["category", "value"])]
        prime: Option<u64>,
        #[arg(long, requires = "value")]
        category: Option<String>,
        #[arg(long, requires = "category")]
        value: Option<String>,
    },
    /// Serve the JSON API.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

fn print<T: Serialize>(result: Result<T>) -> ExitCode {
    let failed = result.is_err();
    if let Err(e) = &result {
        error!(error = %e, "command failed");
    }
    match serde_json::to_string_pretty(&Envelope::from_result(result)) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("could not render the result: {e}");
            return ExitCode::FAILURE;
        }
    }
    if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn open(settings: &Settings) -> Result<Arc<FactInterface>> {
    let db = Database::new(settings.persistence_mode())?;
    if settings.preassign {
        let assigned = db.preassign(&settings.attributes)?;
        if assigned > 0 {
            info!(assigned, "assigned primes to the attribute table");
        }
    }
    Ok(Arc::new(FactInterface::new(
        Arc::new(db),
        settings.attributes.clone(),
        settings.seed,
    )))
}

fn parse_criteria(criteria: &str) -> Result<QueryCriteria> {
    serde_json::from_str(criteria)
        .map_err(|e| SfiError::InvalidParameter(format!("invalid JSON in filter criteria: {e}")))
}

fn main() -> ExitCode {
    // stdout carries the JSON answers, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "command initiated");
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => return print::<()>(Err(e)),
    };
    let interface = match open(&settings) {
        Ok(interface) => interface,
        Err(e) => return print::<()>(Err(e)),
    };

    match cli.command {
        Command::Primes => print(interface.list_primes()),
        Command::Generate { count, seed } => {
            print(interface.generate(count.unwrap_or(settings.default_count), seed))
        }
        Command::Filter { criteria, details } => {
            print(parse_criteria(&criteria).and_then(|c| interface.filter(&c, details)))
        }
        Command::Decode { vector } => {
            print(vector.parse::<FactVector>().and_then(|v| interface.decode(&v)))
        }
        Command::Lookup { prime, category, value } => print(match (prime, category, value) {
            (Some(prime), _, _) => interface.lookup_prime(prime),
            (None, Some(category), Some(value)) => interface.lookup_value(&category, &value),
            _ => Err(SfiError::InvalidParameter(
                "give either --prime, or both --category and --value".into(),
            )),
        }),
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => return print::<()>(Err(SfiError::Config(format!("no async runtime: {e}")))),
            };
            match runtime.block_on(server::serve(interface, &bind, settings.default_count)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => print::<()>(Err(e)),
            }
        }
    }
}
