//! Command-line interface for the fauna ETL layer.
//!
//! Every subcommand resolves its configuration from CLI flags, config files
//! and `FAUNA_*` environment variables, talks to the upstream services
//! through one shared HTTP client, and prints pretty JSON on stdout.
#![forbid(unsafe_code)]

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use fauna_core::{RecordStore, SqliteRecordStore};
use fauna_data::{HttpClientConfig, HttpTransport, ReqwestTransport, ebird, facts, recognition};
use serde::Serialize;

mod error;
mod history;
mod lookup;
mod observations;
mod trigger;

pub use error::CliError;
use history::HistoryArgs;
use lookup::{GeocodeArgs, IdentifyArgs, LookupArgs, RangeArgs};
use observations::{CollectArgs, ObservationsArgs, SpeciesArgs};
use trigger::RunArgs;

const ARG_DATABASE: &str = "database";
const ARG_EBIRD_API_KEY: &str = "ebird-api-key";
const ARG_NINJAS_API_KEY: &str = "ninjas-api-key";
const ARG_WILDLIFE_API_KEY: &str = "wildlife-api-key";
const ARG_REGION: &str = "region";
const ARG_SPECIES: &str = "species";
const ARG_MAX_RESULTS: &str = "max-results";
const ARG_DAYS_BACK: &str = "days-back";
const ARG_CONCURRENCY: &str = "concurrency";
const ARG_LIMIT: &str = "limit";
const ARG_QUERY: &str = "query";
const ARG_ANIMAL: &str = "animal";
const ARG_LOCATIONS: &str = "location";
const ARG_IMAGE: &str = "image";
const ARG_SOURCE: &str = "source";
const ARG_TARGET: &str = "target";
const ARG_STATUS: &str = "status";
const ARG_KIND: &str = "kind";

const ENV_EBIRD_API_KEY: &str = ebird::API_KEY_VARIABLE;
const ENV_NINJAS_API_KEY: &str = facts::API_KEY_VARIABLE;
const ENV_WILDLIFE_API_KEY: &str = recognition::API_KEY_VARIABLE;
const ENV_SPECIES_QUERY: &str = "FAUNA_CMDS_SPECIES_QUERY";
const ENV_LOOKUP_ANIMAL: &str = "FAUNA_CMDS_LOOKUP_ANIMAL";
const ENV_RANGE_ANIMAL: &str = "FAUNA_CMDS_RANGE_ANIMAL";
const ENV_GEOCODE_LOCATIONS: &str = "FAUNA_CMDS_GEOCODE_LOCATIONS";
const ENV_IDENTIFY_IMAGE: &str = "FAUNA_CMDS_IDENTIFY_IMAGE";
const ENV_HISTORY_SOURCE: &str = "FAUNA_CMDS_HISTORY_SOURCE";
const ENV_RUN_SOURCE: &str = "FAUNA_CMDS_RUN_SOURCE";
const ENV_RUN_TARGET: &str = "FAUNA_CMDS_RUN_TARGET";

const DEFAULT_DATABASE: &str = "fauna.db";

/// Run the fauna CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let transport = Arc::new(ReqwestTransport::new(&HttpClientConfig::default())?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    let mut stdout = std::io::stdout().lock();
    runtime.block_on(run_command(cli.command, transport, &mut stdout))
}

/// Resolve `command`'s configuration and execute it against `transport`.
async fn run_command<T>(
    command: Command,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    match command {
        Command::Observations(args) => {
            observations::run_observations(args.into_config()?, transport, writer).await
        }
        Command::Collect(args) => {
            observations::run_collect(args.into_config()?, transport, writer).await
        }
        Command::Species(args) => {
            observations::run_species(args.into_config()?, transport, writer).await
        }
        Command::Lookup(args) => lookup::run_lookup(args.into_config()?, transport, writer).await,
        Command::Geocode(args) => lookup::run_geocode(args.into_config()?, transport, writer).await,
        Command::Range(args) => lookup::run_range(args.into_config()?, transport, writer).await,
        Command::Identify(args) => {
            lookup::run_identify(args.into_config()?, transport, writer).await
        }
        Command::Run(args) => trigger::run_trigger(args.into_config()?, transport, writer).await,
        Command::History(args) => history::run_history(&args.into_config()?, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "fauna",
    about = "Collect and query wildlife data from bird-observation, facts, geocoding and image-recognition services",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Aggregate bird observations, or read them back from the store.
    Observations(ObservationsArgs),
    /// Run the daily all-species collection over the configured regions.
    Collect(CollectArgs),
    /// Search the bird taxonomy for matching species codes.
    Species(SpeciesArgs),
    /// Look up facts about an animal.
    Lookup(LookupArgs),
    /// Geocode one or more place names.
    Geocode(GeocodeArgs),
    /// Map where an animal lives.
    Range(RangeArgs),
    /// Identify the animal in a photo.
    Identify(IdentifyArgs),
    /// Run one provider and store its records.
    Run(RunArgs),
    /// Show recent records persisted for a source.
    History(HistoryArgs),
}

fn open_store(path: &Utf8Path) -> Result<Arc<dyn RecordStore>, CliError> {
    let store = SqliteRecordStore::open(path).map_err(|source| CliError::OpenStore {
        path: path.to_owned(),
        source,
    })?;
    log::debug!("opened record database at {path}");
    Ok(Arc::new(store))
}

fn database_or_default(database: Option<Utf8PathBuf>) -> Utf8PathBuf {
    database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE))
}

/// Treat blank strings as absent so a stray `KEY=` does not count as set.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn write_json<T>(writer: &mut dyn Write, value: &T) -> Result<(), CliError>
where
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
