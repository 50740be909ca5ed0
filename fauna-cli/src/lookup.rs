//! Animal and place lookups: `lookup`, `geocode`, `range` and `identify`.

use std::io::Write;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use fauna_data::enrichment::{animal_range_map, identify_image};
use fauna_data::{
    FactsConfig, FactsProvider, GeocodingConfig, GeocodingProvider, HttpTransport,
    ImageRecognitionConfig, ImageRecognitionProvider, ImageUpload,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_ANIMAL, ARG_IMAGE, ARG_LOCATIONS, ARG_NINJAS_API_KEY, ARG_WILDLIFE_API_KEY, CliError,
    ENV_GEOCODE_LOCATIONS, ENV_IDENTIFY_IMAGE, ENV_LOOKUP_ANIMAL, ENV_NINJAS_API_KEY,
    ENV_RANGE_ANIMAL, ENV_WILDLIFE_API_KEY, non_blank, write_json,
};

/// CLI arguments for the `lookup` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Look up taxonomy, habitat and characteristics for an animal \
                 by common name. Multi-word names with no match are retried \
                 with their last word.",
    about = "Look up facts about an animal"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct LookupArgs {
    /// Common name of the animal.
    #[arg(value_name = ARG_ANIMAL)]
    #[serde(default)]
    pub(crate) animal: Option<String>,
    /// API Ninjas key for the facts service.
    #[arg(
        long = ARG_NINJAS_API_KEY,
        env = ENV_NINJAS_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) ninjas_api_key: Option<String>,
}

impl LookupArgs {
    pub(crate) fn into_config(self) -> Result<AnimalConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        AnimalConfig::from_parts(merged.animal, merged.ninjas_api_key, ENV_LOOKUP_ANIMAL)
    }
}

/// CLI arguments for the `range` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Look up where an animal lives and geocode each habitat \
                 location. Places that cannot be geocoded are left out of \
                 the map.",
    about = "Map where an animal lives"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct RangeArgs {
    /// Common name of the animal.
    #[arg(value_name = ARG_ANIMAL)]
    #[serde(default)]
    pub(crate) animal: Option<String>,
    /// API Ninjas key for the facts service.
    #[arg(
        long = ARG_NINJAS_API_KEY,
        env = ENV_NINJAS_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) ninjas_api_key: Option<String>,
}

impl RangeArgs {
    pub(crate) fn into_config(self) -> Result<AnimalConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        AnimalConfig::from_parts(merged.animal, merged.ninjas_api_key, ENV_RANGE_ANIMAL)
    }
}

/// Resolved configuration shared by `lookup` and `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnimalConfig {
    pub(crate) animal: String,
    pub(crate) api_key: String,
}

impl AnimalConfig {
    fn from_parts(
        animal: Option<String>,
        api_key: Option<String>,
        animal_env: &'static str,
    ) -> Result<Self, CliError> {
        let animal = non_blank(animal).ok_or(CliError::MissingArgument {
            field: ARG_ANIMAL,
            env: animal_env,
        })?;
        let api_key = non_blank(api_key).ok_or(CliError::MissingArgument {
            field: ARG_NINJAS_API_KEY,
            env: ENV_NINJAS_API_KEY,
        })?;
        Ok(Self { animal, api_key })
    }
}

/// CLI arguments for the `geocode` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Geocode place names through OpenStreetMap Nominatim. Each \
                 place keeps its best match; places without a match are \
                 omitted from the coordinates list.",
    about = "Geocode place names"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct GeocodeArgs {
    /// Place names to geocode.
    #[arg(value_name = ARG_LOCATIONS)]
    #[serde(default)]
    pub(crate) locations: Vec<String>,
}

impl GeocodeArgs {
    pub(crate) fn into_config(self) -> Result<GeocodeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        GeocodeConfig::try_from(merged)
    }
}

/// Resolved `geocode` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GeocodeConfig {
    pub(crate) locations: Vec<String>,
}

impl TryFrom<GeocodeArgs> for GeocodeConfig {
    type Error = CliError;

    fn try_from(args: GeocodeArgs) -> Result<Self, Self::Error> {
        let locations: Vec<String> = args
            .locations
            .into_iter()
            .map(|location| location.trim().to_owned())
            .filter(|location| !location.is_empty())
            .collect();
        if locations.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_LOCATIONS,
                env: ENV_GEOCODE_LOCATIONS,
            });
        }
        Ok(Self { locations })
    }
}

/// CLI arguments for the `identify` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Upload a photo to the image-recognition service and print \
                 the most confident detection. When a facts key is available \
                 the detected animal's facts are attached.",
    about = "Identify the animal in a photo"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct IdentifyArgs {
    /// Photo to upload.
    #[arg(value_name = ARG_IMAGE)]
    #[serde(default)]
    pub(crate) image: Option<Utf8PathBuf>,
    /// Wildlife Insights key for the recognition service.
    #[arg(
        long = ARG_WILDLIFE_API_KEY,
        env = ENV_WILDLIFE_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) wildlife_api_key: Option<String>,
    /// API Ninjas key; facts are skipped without it.
    #[arg(
        long = ARG_NINJAS_API_KEY,
        env = ENV_NINJAS_API_KEY,
        value_name = "key",
        hide_env_values = true
    )]
    #[serde(default)]
    pub(crate) ninjas_api_key: Option<String>,
}

impl IdentifyArgs {
    pub(crate) fn into_config(self) -> Result<IdentifyConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IdentifyConfig::try_from(merged)
    }
}

/// Resolved `identify` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IdentifyConfig {
    pub(crate) image: Utf8PathBuf,
    pub(crate) api_key: String,
    pub(crate) facts_api_key: Option<String>,
}

impl TryFrom<IdentifyArgs> for IdentifyConfig {
    type Error = CliError;

    fn try_from(args: IdentifyArgs) -> Result<Self, Self::Error> {
        let image = args.image.ok_or(CliError::MissingArgument {
            field: ARG_IMAGE,
            env: ENV_IDENTIFY_IMAGE,
        })?;
        let api_key = non_blank(args.wildlife_api_key).ok_or(CliError::MissingArgument {
            field: ARG_WILDLIFE_API_KEY,
            env: ENV_WILDLIFE_API_KEY,
        })?;
        Ok(Self {
            image,
            api_key,
            facts_api_key: non_blank(args.ninjas_api_key),
        })
    }
}

pub(crate) fn read_image(path: &Utf8Path) -> Result<ImageUpload, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::ReadImage {
        path: path.to_owned(),
        source,
    })?;
    let file_name = path.file_name().unwrap_or("upload");
    Ok(ImageUpload::new(file_name, bytes))
}

pub(crate) async fn run_lookup<T>(
    config: AnimalConfig,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    let facts = FactsProvider::new(transport, FactsConfig::new(Some(config.api_key)));
    let entries = facts.lookup(&config.animal).await?;
    write_json(writer, &entries)
}

pub(crate) async fn run_geocode<T>(
    config: GeocodeConfig,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    let geocoder = GeocodingProvider::new(transport, GeocodingConfig::default());
    let map = geocoder.get_map_for_locations(&config.locations).await;
    write_json(writer, &map)
}

pub(crate) async fn run_range<T>(
    config: AnimalConfig,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    let facts = FactsProvider::new(Arc::clone(&transport), FactsConfig::new(Some(config.api_key)));
    let geocoder = GeocodingProvider::new(transport, GeocodingConfig::default());
    let range = animal_range_map(&facts, &geocoder, &config.animal).await?;
    write_json(writer, &range)
}

pub(crate) async fn run_identify<T>(
    config: IdentifyConfig,
    transport: Arc<T>,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    T: HttpTransport + 'static,
{
    let image = read_image(&config.image)?;
    let recognizer = ImageRecognitionProvider::new(
        Arc::clone(&transport),
        ImageRecognitionConfig::new(Some(config.api_key)),
    );
    let facts = FactsProvider::new(transport, FactsConfig::new(config.facts_api_key));
    let identification = identify_image(&recognizer, &facts, &image).await?;
    write_json(writer, &identification)
}
