//! The `run` command: one fetch, normalize and store cycle for a provider.
//!
//! Unlike the lookup commands, `run` never fails on provider errors. A
//! missing key or an upstream failure is stored as a failed record and
//! reported in the printed summary.

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use fauna_core::DataSource;
use fauna_data::{
    EbirdConfig, FactsConfig, FactsProvider, GeocodingConfig, GeocodingProvider, HttpTransport,
    ImageRecognitionConfig, ImageRecognitionProvider, ObservationQuery,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::lookup::read_image;
use crate::observations::{DEFAULT_MAX_RESULTS, ebird_provider, resolve_region};
use crate::{
    ARG_DATABASE, ARG_EBIRD_API_KEY, ARG_MAX_RESULTS, ARG_NINJAS_API_KEY, ARG_REGION, ARG_SOURCE,
    ARG_TARGET, ARG_WILDLIFE_API_KEY, CliError, ENV_EBIRD_API_KEY, ENV_NINJAS_API_KEY,
    ENV_RUN_SOURCE, ENV_RUN_TARGET, ENV_WILDLIFE_API_KEY, database_or_default, non_blank,
    open_store, write_json,
};

/// CLI arguments for the `run` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Run one provider cycle and store its records. The target is \
                 an animal name for facts, a place name for geocoding, an \
                 image path for image-recognition, and an optional species \
                 name for bird-observations. Failures are stored as failed \
                 records and reported in the printed summary.",
    about = "Run a provider and store its records"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct RunArgs {
    /// Data source to run.
    #[arg(value_name = ARG_SOURCE)]
    #[serde(default)]
    pub(crate) source: Option<String>,
    /// What to fetch: animal, place, image path or species.
    #[arg(value_name = ARG_TARGET)]
    #[serde(default)]
    pub(crate) target: Option<String>,
    /// Region for bird observations; defaults to "world".
    #[arg(long = ARG_REGION, value_name = "region")]
    #[serde(default)]
    pub(crate) region: Option<String>,
    /// Upper bound on bird sightings requested per region and code.
    #[arg(long = ARG_MAX_RESULTS, value_name = "count")]
    #[serde(default)]
    pub(crate) max_results: Option<u32>,
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
    /// API Ninjas key for the facts service.
    #[arg(
        long = ARG_NINJAS_API_KEY,
        env = ENV_NINJAS_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) ninjas_api_key: Option<String>,
    /// Wildlife Insights key for the recognition service.
    #[arg(
        long = ARG_WILDLIFE_API_KEY,
        env = ENV_WILDLIFE_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) wildlife_api_key: Option<String>,
}

impl RunArgs {
    pub(crate) fn into_config(self) -> Result<RunConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RunConfig::try_from(merged)
    }
}

/// Resolved `run` command configuration.
///
/// Keys stay optional: a provider without its key records a failed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunConfig {
    pub(crate) source: DataSource,
    /// Provider input; empty only for bird observations of every species.
    pub(crate) target: String,
    pub(crate) region: String,
    pub(crate) max_results: u32,
    pub(crate) database: Utf8PathBuf,
    pub(crate) ebird_api_key: Option<String>,
    pub(crate) ninjas_api_key: Option<String>,
    pub(crate) wildlife_api_key: Option<String>,
}

impl TryFrom<RunArgs> for RunConfig {
    type Error = CliError;

    fn try_from(args: RunArgs) -> Result<Self, Self::Error> {
        let source: DataSource = args
            .source
            .ok_or(CliError::MissingArgument {
                field: ARG_SOURCE,
                env: ENV_RUN_SOURCE,
            })?
            .parse()?;
        let target = match non_blank(args.target) {
            Some(target) => target.trim().to_owned(),
            None if source == DataSource::BirdObservations => String::new(),
            None => {
                return Err(CliError::MissingArgument {
                    field: ARG_TARGET,
                    env: ENV_RUN_TARGET,
                });
            }
        };
        let region = match args.region.as_deref() {
            Some(name) => resolve_region(name)?,
            None => fauna_data::regions::WORLD.to_owned(),
        };
        Ok(Self {
            source,
            target,
            region,
            max_results: args.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            database: database_or_default(args.database),
            ebird_api_key: non_blank(args.ebird_api_key),
            ninjas_api_key: non_blank(args.ninjas_api_key),
            wildlife_api_key: non_blank(args.wildlife_api_key),
        })
    }
}

pub(crate) async fn run_trigger<T>(
    config: RunConfig,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    let store = open_store(&config.database)?;
    let summary = match config.source {
        DataSource::Facts => {
            FactsProvider::new(transport, FactsConfig::new(config.ninjas_api_key))
                .run(&config.target, &*store)
                .await
        }
        DataSource::Geocoding => {
            GeocodingProvider::new(transport, GeocodingConfig::default())
                .run(&config.target, &*store)
                .await
        }
        DataSource::ImageRecognition => {
            let image = read_image(Utf8Path::new(&config.target))?;
            ImageRecognitionProvider::new(
                transport,
                ImageRecognitionConfig::new(config.wildlife_api_key),
            )
            .run(&image, &*store)
            .await
        }
        DataSource::BirdObservations => {
            let query = ObservationQuery::new(config.region, config.target, config.max_results);
            ebird_provider(transport, store, EbirdConfig::new(config.ebird_api_key))
                .run(&query)
                .await
        }
    };
    log::info!(
        "{} run finished with status {}",
        config.source,
        summary.status().as_str()
    );
    write_json(writer, &summary)
}
