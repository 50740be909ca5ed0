//! Forward and reverse geocoding against a Nominatim-compatible service.
//!
//! [`GeocodingProvider::fetch`] performs a single call and surfaces every
//! failure. The convenience lookups built on it are best-effort: they log
//! failures and answer `None` or an empty result instead.

use std::sync::Arc;

use async_trait::async_trait;
use fauna_core::{
    DataSource, LocationLookup, LocationMap, LocationResult, Provider, ProviderError,
    RecordStore, RunSummary, run_provider,
};
use geo::Coord;
use serde_json::Value;

use crate::fields;
use crate::http::{HttpRequest, HttpTransport, endpoint};

/// Default geocoding service.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// Settings for [`GeocodingProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodingConfig {
    /// Base URL of the geocoding service.
    pub base_url: String,
    /// Maximum results requested per forward lookup.
    pub result_limit: u32,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NOMINATIM_URL.to_owned(),
            result_limit: 5,
        }
    }
}

impl GeocodingConfig {
    /// Override the service URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the number of results requested per lookup.
    #[must_use]
    pub const fn with_result_limit(mut self, limit: u32) -> Self {
        self.result_limit = limit;
        self
    }
}

/// Geocoding provider.
pub struct GeocodingProvider<T> {
    transport: Arc<T>,
    config: GeocodingConfig,
}

impl<T> std::fmt::Debug for GeocodingProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodingProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: HttpTransport> GeocodingProvider<T> {
    /// Provider calling the service through `transport`.
    #[must_use]
    pub const fn new(transport: Arc<T>, config: GeocodingConfig) -> Self {
        Self { transport, config }
    }

    /// Fetch, normalize and store the results for `query`.
    pub async fn run(&self, query: &str, store: &dyn RecordStore) -> RunSummary {
        run_provider(self, query, store).await
    }

    /// Coordinates of the best match for `location`, if any.
    pub async fn geocode_single(&self, location: &str) -> Option<Coord<f64>> {
        match self.lookup(location).await {
            Ok(results) => results.first().map(|result| result.coordinates),
            Err(err) => {
                log::warn!("geocoding {location:?} failed: {err}");
                None
            }
        }
    }

    /// Upper-cased ISO country code at `coordinates`, if any.
    pub async fn reverse_geocode_country(&self, coordinates: Coord<f64>) -> Option<String> {
        match self.reverse(coordinates).await {
            Ok(code) => code,
            Err(err) => {
                log::warn!(
                    "reverse geocoding ({}, {}) failed: {err}",
                    coordinates.y,
                    coordinates.x
                );
                None
            }
        }
    }

    /// Geocode each of `locations`, keeping the best point per location.
    ///
    /// A failed lookup is logged and recorded as an empty result for that
    /// location; the rest of the batch still runs.
    pub async fn get_map_for_locations(&self, locations: &[String]) -> LocationMap {
        let mut lookups = Vec::with_capacity(locations.len());
        for location in locations {
            let results = match self.lookup(location).await {
                Ok(results) => results.into_iter().take(1).collect(),
                Err(err) => {
                    log::warn!("skipping location {location:?}: {err}");
                    Vec::new()
                }
            };
            lookups.push(LocationLookup {
                query: location.clone(),
                results,
            });
        }
        LocationMap::from_lookups(lookups)
    }

    async fn lookup(&self, location: &str) -> Result<Vec<LocationResult>, ProviderError> {
        let raw = self.fetch(location).await?;
        Ok(self.normalize(&raw))
    }

    async fn reverse(&self, coordinates: Coord<f64>) -> Result<Option<String>, ProviderError> {
        let request = HttpRequest::get(endpoint(&self.config.base_url, &["reverse"])?)
            .with_query("lat", &coordinates.y.to_string())
            .with_query("lon", &coordinates.x.to_string())
            .with_query("format", "jsonv2");
        let body: Value = self.transport.send(request).await?.json()?;
        Ok(body
            .get("address")
            .and_then(|address| fields::text(address, "country_code"))
            .map(|code| code.to_ascii_uppercase()))
    }
}

fn point_feature(feature: &Value) -> Option<LocationResult> {
    let geometry = feature.get("geometry")?;
    if fields::text(geometry, "type").as_deref() != Some("Point") {
        return None;
    }
    let position = fields::array(geometry, "coordinates");
    let longitude = position.first().and_then(Value::as_f64)?;
    let latitude = position.get(1).and_then(Value::as_f64)?;
    let properties = feature.get("properties").unwrap_or(&Value::Null);
    Some(LocationResult {
        coordinates: Coord {
            x: longitude,
            y: latitude,
        },
        display_name: fields::text(properties, "display_name"),
        kind: fields::text(properties, "type"),
        class: fields::text(properties, "category").or_else(|| fields::text(properties, "class")),
    })
}

#[async_trait]
impl<T: HttpTransport> Provider for GeocodingProvider<T> {
    type Params = str;
    type Raw = Value;
    type Item = LocationResult;

    fn source(&self) -> DataSource {
        DataSource::Geocoding
    }

    async fn fetch(&self, query: &str) -> Result<Value, ProviderError> {
        let request = HttpRequest::get(endpoint(&self.config.base_url, &["search"])?)
            .with_query("q", query)
            .with_query("format", "geojson")
            .with_query("limit", &self.config.result_limit.to_string());
        log::debug!("geocoding {query:?}");
        Ok(self.transport.send(request).await?.json()?)
    }

    fn normalize(&self, raw: &Value) -> Vec<LocationResult> {
        fields::array(raw, "features")
            .iter()
            .filter_map(point_feature)
            .collect()
    }
}
