//! Bird-observation commands: `observations`, `collect` and `species`.

use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use fauna_core::RecordStore;
use fauna_data::regions::region_code_for;
use fauna_data::taxonomy::DEFAULT_TAXONOMY_URL;
use fauna_data::{
    EbirdConfig, EbirdProvider, HttpTaxonomySource, HttpTransport, SpeciesResolver, TaxonomyCache,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_CONCURRENCY, ARG_DATABASE, ARG_DAYS_BACK, ARG_EBIRD_API_KEY, ARG_LIMIT, ARG_MAX_RESULTS,
    ARG_QUERY, ARG_REGION, ARG_SPECIES, CliError, ENV_EBIRD_API_KEY, ENV_SPECIES_QUERY,
    database_or_default, non_blank, open_store, write_json,
};

pub(crate) const DEFAULT_MAX_RESULTS: u32 = 100;
const DEFAULT_DAYS_BACK: u32 = 30;
const DEFAULT_SPECIES_LIMIT: usize = 10;

/// CLI arguments for the `observations` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Aggregate recent bird observations. With --region the upstream \
                 service is queried directly (\"world\" fans out over the \
                 configured countries) and the results are stored. Without a \
                 region, stored observations from the last --days-back days \
                 are returned, fetching world-wide only when none match.",
    about = "Aggregate or read back bird observations"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct ObservationsArgs {
    /// Species name to match; empty means every species.
    #[arg(long = ARG_SPECIES, value_name = "name")]
    #[serde(default)]
    pub(crate) species: Option<String>,
    /// Country name, two-letter region code, or "world".
    #[arg(long = ARG_REGION, value_name = "region")]
    #[serde(default)]
    pub(crate) region: Option<String>,
    /// Upper bound on sightings requested per region and species code.
    #[arg(long = ARG_MAX_RESULTS, value_name = "count")]
    #[serde(default)]
    pub(crate) max_results: Option<u32>,
    /// Age limit, in days, for stored observations.
    #[arg(long = ARG_DAYS_BACK, value_name = "days")]
    #[serde(default)]
    pub(crate) days_back: Option<u32>,
    /// Upstream requests kept in flight at once.
    #[arg(long = ARG_CONCURRENCY, value_name = "count")]
    #[serde(default)]
    pub(crate) concurrency: Option<usize>,
    /// SQLite database holding persisted records.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// eBird API key.
    #[arg(
        long = ARG_EBIRD_API_KEY,
        env = ENV_EBIRD_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) ebird_api_key: Option<String>,
}

impl ObservationsArgs {
    pub(crate) fn into_config(self) -> Result<ObservationsConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ObservationsConfig::try_from(merged)
    }
}

/// Resolved `observations` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObservationsConfig {
    pub(crate) species: String,
    /// Region code to fetch from; `None` reads the store first.
    pub(crate) region: Option<String>,
    pub(crate) max_results: u32,
    pub(crate) days_back: u32,
    pub(crate) concurrency: usize,
    pub(crate) database: Utf8PathBuf,
    pub(crate) api_key: String,
}

impl TryFrom<ObservationsArgs> for ObservationsConfig {
    type Error = CliError;

    fn try_from(args: ObservationsArgs) -> Result<Self, Self::Error> {
        let api_key = require_ebird_key(args.ebird_api_key)?;
        let region = args.region.as_deref().map(resolve_region).transpose()?;
        Ok(Self {
            species: args.species.unwrap_or_default().trim().to_owned(),
            region,
            max_results: args.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            days_back: args.days_back.unwrap_or(DEFAULT_DAYS_BACK),
            concurrency: args.concurrency.unwrap_or(1).max(1),
            database: database_or_default(args.database),
            api_key,
        })
    }
}

/// CLI arguments for the `collect` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch and store every recent sighting for each configured \
                 country. A country that fails is reported with zero items \
                 and does not stop the others.",
    about = "Run the daily bird-observation collection"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct CollectArgs {
    /// Countries to visit; repeat the flag for several. Defaults to the daily list.
    #[arg(long = ARG_REGION, value_name = "region")]
    #[serde(default)]
    pub(crate) regions: Vec<String>,
    /// Upstream requests kept in flight at once.
    #[arg(long = ARG_CONCURRENCY, value_name = "count")]
    #[serde(default)]
    pub(crate) concurrency: Option<usize>,
    /// SQLite database holding persisted records.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// eBird API key.
    #[arg(
        long = ARG_EBIRD_API_KEY,
        env = ENV_EBIRD_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) ebird_api_key: Option<String>,
}

impl CollectArgs {
    pub(crate) fn into_config(self) -> Result<CollectConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        CollectConfig::try_from(merged)
    }
}

/// Resolved `collect` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CollectConfig {
    /// Region codes to visit; empty keeps the provider's daily list.
    pub(crate) regions: Vec<String>,
    pub(crate) concurrency: usize,
    pub(crate) database: Utf8PathBuf,
    pub(crate) api_key: String,
}

impl TryFrom<CollectArgs> for CollectConfig {
    type Error = CliError;

    fn try_from(args: CollectArgs) -> Result<Self, Self::Error> {
        let api_key = require_ebird_key(args.ebird_api_key)?;
        let regions = args
            .regions
            .iter()
            .map(|name| resolve_region(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            regions,
            concurrency: args.concurrency.unwrap_or(1).max(1),
            database: database_or_default(args.database),
            api_key,
        })
    }
}

/// CLI arguments for the `species` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Search the eBird taxonomy by common or scientific name. \
                 Exact matches come first, then shorter common names.",
    about = "Find species codes for a bird name"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct SpeciesArgs {
    /// Common or scientific name to search for.
    #[arg(value_name = ARG_QUERY)]
    #[serde(default)]
    pub(crate) query: Option<String>,
    /// Maximum number of entries printed.
    #[arg(long = ARG_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    /// eBird API key, sent with the taxonomy download when set.
    #[arg(
        long = ARG_EBIRD_API_KEY,
        env = ENV_EBIRD_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) ebird_api_key: Option<String>,
}

impl SpeciesArgs {
    pub(crate) fn into_config(self) -> Result<SpeciesConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SpeciesConfig::try_from(merged)
    }
}

/// Resolved `species` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpeciesConfig {
    pub(crate) query: String,
    pub(crate) limit: usize,
    pub(crate) api_key: Option<String>,
}

impl TryFrom<SpeciesArgs> for SpeciesConfig {
    type Error = CliError;

    fn try_from(args: SpeciesArgs) -> Result<Self, Self::Error> {
        let query = non_blank(args.query).ok_or(CliError::MissingArgument {
            field: ARG_QUERY,
            env: ENV_SPECIES_QUERY,
        })?;
        Ok(Self {
            query,
            limit: args.limit.unwrap_or(DEFAULT_SPECIES_LIMIT),
            api_key: non_blank(args.ebird_api_key),
        })
    }
}

fn require_ebird_key(api_key: Option<String>) -> Result<String, CliError> {
    non_blank(api_key).ok_or(CliError::MissingArgument {
        field: ARG_EBIRD_API_KEY,
        env: ENV_EBIRD_API_KEY,
    })
}

pub(crate) fn resolve_region(name: &str) -> Result<String, CliError> {
    region_code_for(name).ok_or_else(|| CliError::UnknownRegion {
        name: name.to_owned(),
    })
}

fn species_resolver<T>(transport: Arc<T>, api_key: Option<String>) -> SpeciesResolver
where
    T: HttpTransport + 'static,
{
    let source = HttpTaxonomySource::new(transport, DEFAULT_TAXONOMY_URL).with_api_key(api_key);
    SpeciesResolver::new(Arc::new(source), Arc::new(TaxonomyCache::new()))
}

pub(crate) fn ebird_provider<T>(
    transport: Arc<T>,
    store: Arc<dyn RecordStore>,
    config: EbirdConfig,
) -> EbirdProvider<T>
where
    T: HttpTransport + 'static,
{
    let resolver = species_resolver(Arc::clone(&transport), config.api_key.clone());
    EbirdProvider::new(transport, store, resolver, config)
}

pub(crate) async fn run_observations<T>(
    config: ObservationsConfig,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    let store = open_store(&config.database)?;
    let ebird = EbirdConfig::new(Some(config.api_key)).with_concurrency(config.concurrency);
    let provider = ebird_provider(transport, store, ebird);
    let observations = match config.region.as_deref() {
        Some(region) => {
            provider
                .run_etl(region, &config.species, config.max_results)
                .await
        }
        None => {
            provider
                .get_observations(&config.species, config.days_back)
                .await?
        }
    };
    write_json(writer, &observations)
}

pub(crate) async fn run_collect<T>(
    config: CollectConfig,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    let store = open_store(&config.database)?;
    let mut ebird = EbirdConfig::new(Some(config.api_key)).with_concurrency(config.concurrency);
    if !config.regions.is_empty() {
        ebird = ebird.with_daily_regions(config.regions);
    }
    let provider = ebird_provider(transport, store, ebird);
    let reports = provider.collect_daily().await;
    write_json(writer, &reports)
}

pub(crate) async fn run_species<T>(
    config: SpeciesConfig,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    let resolver = species_resolver(transport, config.api_key);
    let entries = resolver.search(&config.query, config.limit).await?;
    write_json(writer, &entries)
}
