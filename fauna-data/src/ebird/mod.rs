//! Bird-observation aggregation over regional upstream endpoints.
//!
//! A single logical query such as "robins, worldwide" becomes a fan-out of
//! `(region, species code)` calls. Species names are resolved to up to
//! [`EbirdConfig::max_candidate_codes`] codes through a [`SpeciesResolver`],
//! `"world"` expands into [`EbirdConfig::world_regions`], and every pair is
//! fetched under the configured [`RetryPolicy`]. A pair that exhausts its
//! retries contributes nothing; the other pairs still count. Results are
//! merged by observation identifier, first occurrence winning.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use fauna_core::{
    DataSource, NewRecord, Observation, PayloadKind, Provider, ProviderError, RecordQuery,
    RecordStatus, RecordStore, RunSummary, StoreError, dedup_by_id, run_provider,
};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::http::{HttpRequest, HttpTransport, RetryPolicy, endpoint};
use crate::regions::{WORLD, default_daily_regions, default_world_regions};
use crate::taxonomy::SpeciesResolver;

mod fanout;
mod normalize;

use fanout::{Aggregate, FetchPair, plan};
pub use normalize::{UNIDENTIFIED, normalize_observations};

/// Default observation endpoint.
pub const DEFAULT_EBIRD_URL: &str = "https://api.ebird.org/v2/data/obs";

/// Variable naming the observation API key.
pub const API_KEY_VARIABLE: &str = "EBIRD_API_KEY";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Settings for [`EbirdProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbirdConfig {
    /// API key sent as `X-eBirdApiToken`.
    pub api_key: Option<String>,
    /// Base URL of the observation endpoint.
    pub base_url: String,
    /// Timeout applied to each upstream call.
    pub timeout: Duration,
    /// Retry policy applied per `(region, code)` pair.
    pub retry: RetryPolicy,
    /// Countries queried when the region is `"world"`.
    pub world_regions: Vec<String>,
    /// Countries visited by [`EbirdProvider::collect_daily`].
    pub daily_regions: Vec<String>,
    /// Maximum candidate species codes per query.
    pub max_candidate_codes: usize,
    /// `maxResults` used by the cache-miss fetch of
    /// [`EbirdProvider::get_observations`] and by daily collection.
    pub fallback_max_results: u32,
    /// Maximum normalized records scanned when searching the cache.
    pub cache_scan_limit: usize,
    /// Upstream calls kept in flight at once. One means sequential.
    pub concurrency: usize,
}

impl Default for EbirdConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_EBIRD_URL.to_owned(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            world_regions: default_world_regions(),
            daily_regions: default_daily_regions(),
            max_candidate_codes: 5,
            fallback_max_results: 100,
            cache_scan_limit: 50,
            concurrency: 1,
        }
    }
}

impl EbirdConfig {
    /// Default settings using `api_key`.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            ..Self::default()
        }
    }

    /// Override the observation endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the countries standing in for `"world"`.
    #[must_use]
    pub fn with_world_regions(mut self, regions: Vec<String>) -> Self {
        self.world_regions = regions;
        self
    }

    /// Override the countries visited by daily collection.
    #[must_use]
    pub fn with_daily_regions(mut self, regions: Vec<String>) -> Self {
        self.daily_regions = regions;
        self
    }

    /// Keep up to `concurrency` upstream calls in flight.
    ///
    /// Results are merged in plan order, so the output matches a
    /// sequential run.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// Parameters of one aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservationQuery {
    /// Region code or `"world"`.
    pub region: String,
    /// Free-text species name; empty for all species.
    pub species: String,
    /// `maxResults` sent with each upstream call.
    pub max_results: u32,
}

impl ObservationQuery {
    /// Build a query.
    #[must_use]
    pub fn new(region: impl Into<String>, species: impl Into<String>, max_results: u32) -> Self {
        Self {
            region: region.into(),
            species: species.into(),
            max_results,
        }
    }
}

/// Items collected for one region by [`EbirdProvider::collect_daily`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionReport {
    /// Region code.
    pub region: String,
    /// Normalized observations returned for the region.
    pub item_count: usize,
}

/// Aggregating bird-observation provider.
pub struct EbirdProvider<T> {
    transport: Arc<T>,
    store: Arc<dyn RecordStore>,
    resolver: SpeciesResolver,
    config: EbirdConfig,
}

impl<T> std::fmt::Debug for EbirdProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EbirdProvider")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: HttpTransport> EbirdProvider<T> {
    /// Provider calling upstream through `transport` and persisting into
    /// `store`.
    #[must_use]
    pub fn new(
        transport: Arc<T>,
        store: Arc<dyn RecordStore>,
        resolver: SpeciesResolver,
        config: EbirdConfig,
    ) -> Self {
        Self {
            transport,
            store,
            resolver,
            config,
        }
    }

    /// Active settings.
    #[must_use]
    pub const fn config(&self) -> &EbirdConfig {
        &self.config
    }

    /// Fetch, normalize and store `query` through [`run_provider`].
    pub async fn run(&self, query: &ObservationQuery) -> RunSummary {
        run_provider(self, query, self.store.as_ref()).await
    }

    /// Aggregate observations for `species` in `region` and persist them.
    ///
    /// Persists a raw and a normalized record tagged with the region and
    /// species, then returns the normalized items. Never fails: a missing
    /// key or an unresolved species is logged and yields an empty list
    /// without persisting anything.
    pub async fn run_etl(&self, region: &str, species: &str, max_results: u32) -> Vec<Observation> {
        let query = ObservationQuery::new(region, species, max_results);
        log::info!("starting observation ETL for region {region:?}, species {species:?}");
        let raw = match self.fetch(&query).await {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("observation ETL for {region:?}/{species:?} returned nothing: {err}");
                return Vec::new();
            }
        };
        let items = self.normalize(&raw);
        if let Err(err) = self.persist(&query, &raw, &items) {
            log::error!("failed to persist observations for {region:?}/{species:?}: {err}");
        }
        log::info!(
            "observation ETL for {region:?}/{species:?} kept {} of {} items",
            items.len(),
            raw.len()
        );
        items
    }

    /// Observations of `species` from the last `days_back` days.
    ///
    /// Persisted normalized records are searched first. Only on a miss is
    /// a world-wide [`run_etl`](Self::run_etl) performed, after which the
    /// records are searched again.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Store`] when the record store cannot be read.
    pub async fn get_observations(
        &self,
        species: &str,
        days_back: u32,
    ) -> Result<Vec<Observation>, ProviderError> {
        let since = SystemTime::now()
            .checked_sub(Duration::from_secs(u64::from(days_back) * SECONDS_PER_DAY))
            .unwrap_or(UNIX_EPOCH);
        let cached = self.search_cached(species, since)?;
        if !cached.is_empty() {
            log::info!("found {} cached observations of {species:?}", cached.len());
            return Ok(cached);
        }

        log::info!("no cached observations of {species:?}; fetching world-wide");
        self.run_etl(WORLD, species, self.config.fallback_max_results)
            .await;
        Ok(self.search_cached(species, since)?)
    }

    /// Run an all-species aggregation for every configured daily region.
    ///
    /// Regions are visited one at a time; a region that yields nothing does
    /// not stop the others.
    pub async fn collect_daily(&self) -> Vec<RegionReport> {
        let mut reports = Vec::with_capacity(self.config.daily_regions.len());
        for region in &self.config.daily_regions {
            let items = self
                .run_etl(region, "", self.config.fallback_max_results)
                .await;
            reports.push(RegionReport {
                region: region.clone(),
                item_count: items.len(),
            });
        }
        log::info!("daily collection visited {} regions", reports.len());
        reports
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingCredential {
                provider: DataSource::BirdObservations,
                variable: API_KEY_VARIABLE,
            })
    }

    async fn candidate_codes(&self, species: &str) -> Result<Vec<String>, ProviderError> {
        if species.trim().is_empty() {
            return Ok(vec![String::new()]);
        }
        self.resolver
            .resolve_codes(species, self.config.max_candidate_codes)
            .await
    }

    async fn fetch_pair(
        &self,
        api_key: &str,
        pair: &FetchPair,
        max_results: u32,
    ) -> Result<Vec<Value>, ProviderError> {
        let url = endpoint(
            &self.config.base_url,
            &[pair.region.as_str(), "recent", pair.code.as_str()],
        )?;
        let label = format!("observation fetch {}/{}", pair.region, pair.code);
        let label = label.as_str();
        let max_results = max_results.to_string();
        self.config
            .retry
            .run(label, |attempt| {
                let request = HttpRequest::get(url.clone())
                    .with_query("maxResults", &max_results)
                    .with_header("X-eBirdApiToken", api_key)
                    .with_timeout(self.config.timeout);
                async move {
                    log::debug!("{label}: attempt {attempt}");
                    let response = self.transport.send(request).await?;
                    Ok(response.json::<Vec<Value>>()?)
                }
            })
            .await
    }

    async fn fetch_pair_or_empty(&self, api_key: &str, pair: &FetchPair, max_results: u32) -> Vec<Value> {
        match self.fetch_pair(api_key, pair, max_results).await {
            Ok(items) => {
                log::info!(
                    "fetched {} observations for {}/{}",
                    items.len(),
                    pair.region,
                    pair.code
                );
                items
            }
            Err(err) => {
                log::warn!(
                    "giving up on {}/{} after retries: {err}",
                    pair.region,
                    pair.code
                );
                Vec::new()
            }
        }
    }

    fn persist(
        &self,
        query: &ObservationQuery,
        raw: &[Value],
        items: &[Observation],
    ) -> Result<(), ProviderError> {
        let payloads = [
            (PayloadKind::Raw, serde_json::to_value(raw)),
            (PayloadKind::Normalized, serde_json::to_value(items)),
        ];
        for (kind, payload) in payloads {
            let payload = payload.map_err(StoreError::from)?;
            self.store.insert(
                NewRecord::success(DataSource::BirdObservations, kind, payload)
                    .with_tag("region", query.region.as_str())
                    .with_tag("species", query.species.as_str()),
            )?;
        }
        Ok(())
    }

    fn search_cached(
        &self,
        species: &str,
        since: SystemTime,
    ) -> Result<Vec<Observation>, StoreError> {
        let query = RecordQuery::new(DataSource::BirdObservations)
            .since(since)
            .payload_kind(PayloadKind::Normalized)
            .status(RecordStatus::Success)
            .limit(self.config.cache_scan_limit);
        let needle = species.trim().to_lowercase();
        let matches = self
            .store
            .find(&query)?
            .into_iter()
            .filter_map(|record| {
                let payload = record.payload?;
                match serde_json::from_value::<Vec<Observation>>(payload) {
                    Ok(items) => Some(items),
                    Err(err) => {
                        log::warn!("skipping unreadable observation record {}: {err}", record.id);
                        None
                    }
                }
            })
            .flatten()
            .filter(|observation| observation.matches_species(&needle));
        Ok(dedup_by_id(matches))
    }
}

#[async_trait]
impl<T: HttpTransport> Provider for EbirdProvider<T> {
    type Params = ObservationQuery;
    type Raw = Vec<Value>;
    type Item = Observation;

    fn source(&self) -> DataSource {
        DataSource::BirdObservations
    }

    async fn fetch(&self, query: &ObservationQuery) -> Result<Vec<Value>, ProviderError> {
        let api_key = self.api_key()?;
        let codes = self.candidate_codes(&query.species).await?;
        let pairs = plan(&query.region, &codes, &self.config.world_regions);
        log::debug!(
            "fanning out {} observation fetches for {:?}",
            pairs.len(),
            query.region
        );

        let fetches: Vec<_> = pairs
            .iter()
            .map(|pair| self.fetch_pair_or_empty(api_key, pair, query.max_results))
            .collect();
        let batches: Vec<Vec<Value>> = stream::iter(fetches)
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        Ok(batches
            .into_iter()
            .flatten()
            .fold(Aggregate::default(), Aggregate::push)
            .into_items())
    }

    fn normalize(&self, raw: &Vec<Value>) -> Vec<Observation> {
        normalize_observations(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::TaxonomyCache;
    use crate::test_support::{StubTaxonomySource, StubTransport, block_on, ebird_body, sighting};
    use fauna_core::{MemoryRecordStore, TaxonomyEntry, TransportError};
    use rstest::rstest;

    fn provider(
        transport: StubTransport,
        config: EbirdConfig,
    ) -> (EbirdProvider<StubTransport>, Arc<MemoryRecordStore>, Arc<StubTransport>) {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryRecordStore::new());
        let source = Arc::new(StubTaxonomySource::with_entries(vec![
            TaxonomyEntry::new("American Robin", "Turdus migratorius", "amerob"),
            TaxonomyEntry::new("Wren", "Troglodytes troglodytes", "winwre4"),
        ]));
        let resolver = SpeciesResolver::new(source, Arc::new(TaxonomyCache::new()));
        let provider = EbirdProvider::new(transport.clone(), store.clone(), resolver, config);
        (provider, store, transport)
    }

    fn config() -> EbirdConfig {
        EbirdConfig::new(Some("test-key".into()))
            .with_retry(RetryPolicy::new(3, Duration::ZERO))
            .with_world_regions(vec!["US".into(), "GB".into()])
    }

    #[rstest]
    fn missing_key_fails_before_any_request() {
        let (provider, _, transport) = provider(StubTransport::new(), EbirdConfig::default());

        let err = block_on(provider.fetch(&ObservationQuery::new("US", "", 10)))
            .expect_err("no key");

        assert!(matches!(
            err,
            ProviderError::MissingCredential {
                variable: API_KEY_VARIABLE,
                ..
            }
        ));
        assert!(transport.requests().is_empty());
    }

    #[rstest]
    fn requests_carry_key_and_limit() {
        let transport = StubTransport::new().route("/ES/recent", ebird_body(&[sighting("A", "Robin")]));
        let (provider, _, transport) = provider(transport, config());

        let items = block_on(provider.run_etl("ES", "", 25));

        assert_eq!(items.len(), 1);
        let requests = transport.requests();
        assert_eq!(
            requests[0].url().as_str(),
            "https://api.ebird.org/v2/data/obs/ES/recent?maxResults=25"
        );
        assert_eq!(requests[0].header("X-eBirdApiToken"), Some("test-key"));
        assert_eq!(requests[0].timeout(), Some(Duration::from_secs(10)));
    }

    #[rstest]
    fn species_queries_use_resolved_codes() {
        let transport =
            StubTransport::new().route("/US/recent/amerob", ebird_body(&[sighting("A", "American Robin")]));
        let (provider, _, transport) = provider(transport, config());

        let items = block_on(provider.run_etl("US", "robin", 10));

        assert_eq!(items.len(), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[rstest]
    fn unresolved_species_returns_nothing_and_persists_nothing() {
        let (provider, store, transport) = provider(StubTransport::new(), config());

        let items = block_on(provider.run_etl("world", "dodo", 10));

        assert!(items.is_empty());
        assert!(transport.requests().is_empty());
        assert!(store.is_empty().expect("store readable"));
    }

    #[rstest]
    fn persisted_records_are_tagged() {
        let transport = StubTransport::new().route("/recent", ebird_body(&[sighting("A", "Robin")]));
        let (provider, store, _) = provider(transport, config());

        block_on(provider.run_etl("world", "", 10));

        let records = store.records().expect("records");
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.tags.get("region").map(String::as_str), Some("world"));
            assert_eq!(record.tags.get("species").map(String::as_str), Some(""));
        }
        let kinds: Vec<_> = records.iter().filter_map(fauna_core::Record::payload_kind).collect();
        assert_eq!(kinds, vec![PayloadKind::Raw, PayloadKind::Normalized]);
    }

    #[rstest]
    fn concurrent_fan_out_matches_sequential_output() {
        let routes = || {
            StubTransport::new()
                .route("/US/recent", ebird_body(&[sighting("A", "Robin"), sighting("B", "Wren")]))
                .route("/GB/recent", ebird_body(&[sighting("B", "Wren"), sighting("C", "Jay")]))
        };
        let (sequential, _, _) = provider(routes(), config());
        let (concurrent, _, _) = provider(routes(), config().with_concurrency(4));

        let expected = block_on(sequential.run_etl("world", "", 10));
        let actual = block_on(concurrent.run_etl("world", "", 10));

        assert_eq!(actual, expected);
        assert_eq!(actual.len(), 3);
    }

    #[rstest]
    fn cached_observations_skip_the_network() {
        let transport = StubTransport::new().route("/recent/amerob", ebird_body(&[sighting("A", "American Robin")]));
        let (provider, _, transport) = provider(transport, config());

        let first = block_on(provider.get_observations("robin", 30)).expect("first read");
        let calls_after_first = transport.requests().len();
        let second = block_on(provider.get_observations("Robin", 30)).expect("second read");

        assert_eq!(first.len(), 1);
        assert_eq!(second, first);
        assert_eq!(calls_after_first, 2);
        assert_eq!(transport.requests().len(), calls_after_first);
    }

    #[rstest]
    fn daily_collection_reports_each_region() {
        let transport = StubTransport::new()
            .route("/US/recent", ebird_body(&[sighting("A", "Robin")]))
            .route_error(
                "/ES/recent",
                TransportError::Http {
                    url: "https://api.ebird.org/v2/data/obs/ES/recent".into(),
                    status: 503,
                    message: "unavailable".into(),
                },
            );
        let config = config().with_daily_regions(vec!["US".into(), "ES".into()]);
        let (provider, _, _) = provider(transport, config);

        let reports = block_on(provider.collect_daily());

        assert_eq!(
            reports,
            vec![
                RegionReport {
                    region: "US".into(),
                    item_count: 1
                },
                RegionReport {
                    region: "ES".into(),
                    item_count: 0
                },
            ]
        );
    }
}
