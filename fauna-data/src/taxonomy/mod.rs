//! Species taxonomy resolution.
//!
//! The reference list (tens of thousands of entries) is loaded lazily on
//! first use through a [`TaxonomySource`] and kept for the lifetime of the
//! owning [`TaxonomyCache`]. [`SpeciesResolver`] turns free-text names into
//! ranked candidate species codes.
//!
//! Callers share one cache across resolvers by cloning the `Arc`; the cache
//! guarantees that concurrent first calls trigger a single load.

use std::sync::Arc;

use async_trait::async_trait;
use fauna_core::{ProviderError, TaxonomyEntry};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::http::{HttpRequest, HttpTransport, endpoint};

mod rank;

pub use rank::{distinct_codes, rank_matches};

/// Default taxonomy endpoint.
pub const DEFAULT_TAXONOMY_URL: &str = "https://api.ebird.org/v2/ref/taxonomy/ebird";

/// Supplies the full taxonomy reference list.
#[async_trait]
pub trait TaxonomySource: Send + Sync {
    /// Load every entry.
    async fn load(&self) -> Result<Vec<TaxonomyEntry>, ProviderError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTaxon {
    #[serde(default)]
    com_name: Option<String>,
    #[serde(default)]
    sci_name: Option<String>,
    #[serde(default)]
    species_code: Option<String>,
}

impl RawTaxon {
    fn into_entry(self) -> Option<TaxonomyEntry> {
        let code = self.species_code.filter(|code| !code.trim().is_empty())?;
        Some(TaxonomyEntry::new(
            self.com_name.unwrap_or_default(),
            self.sci_name.unwrap_or_default(),
            code,
        ))
    }
}

/// [`TaxonomySource`] reading the reference list over HTTP as JSON.
#[derive(Debug)]
pub struct HttpTaxonomySource<T> {
    transport: Arc<T>,
    url: String,
    api_key: Option<String>,
}

impl<T: HttpTransport> HttpTaxonomySource<T> {
    /// Source reading from `url`.
    #[must_use]
    pub fn new(transport: Arc<T>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            api_key: None,
        }
    }

    /// Send `api_key` with the request when present.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }
}

#[async_trait]
impl<T: HttpTransport> TaxonomySource for HttpTaxonomySource<T> {
    async fn load(&self) -> Result<Vec<TaxonomyEntry>, ProviderError> {
        let mut request = HttpRequest::get(endpoint(&self.url, &[])?).with_query("fmt", "json");
        if let Some(key) = &self.api_key {
            request = request.with_header("X-eBirdApiToken", key.as_str());
        }
        let response = self.transport.send(request).await?;
        let taxa: Vec<RawTaxon> = response.json()?;
        let entries: Vec<TaxonomyEntry> =
            taxa.into_iter().filter_map(RawTaxon::into_entry).collect();
        log::info!("loaded {} taxonomy entries from {}", entries.len(), self.url);
        Ok(entries)
    }
}

/// Process-lifetime store for the taxonomy reference list.
///
/// A successful load is never repeated or evicted. A failed load leaves the
/// cache empty so a later call can try again.
#[derive(Debug, Default)]
pub struct TaxonomyCache {
    entries: OnceCell<Arc<[TaxonomyEntry]>>,
}

impl TaxonomyCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-filled with `entries`.
    #[must_use]
    pub fn with_entries(entries: Vec<TaxonomyEntry>) -> Self {
        Self {
            entries: OnceCell::new_with(Some(entries.into())),
        }
    }

    /// Whether the reference list has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.entries.initialized()
    }

    /// Return the cached list, loading it from `source` on first use.
    ///
    /// Concurrent callers wait for a single in-flight load.
    ///
    /// # Errors
    ///
    /// Propagates the load error; the cache stays empty in that case.
    pub async fn get_or_load(
        &self,
        source: &dyn TaxonomySource,
    ) -> Result<Arc<[TaxonomyEntry]>, ProviderError> {
        self.entries
            .get_or_try_init(|| async { source.load().await.map(Arc::from) })
            .await
            .map(Arc::clone)
    }
}

/// Resolves free-text species names into species codes.
#[derive(Clone)]
pub struct SpeciesResolver {
    source: Arc<dyn TaxonomySource>,
    cache: Arc<TaxonomyCache>,
}

impl std::fmt::Debug for SpeciesResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeciesResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl SpeciesResolver {
    /// Resolver loading through `source` into `cache`.
    #[must_use]
    pub fn new(source: Arc<dyn TaxonomySource>, cache: Arc<TaxonomyCache>) -> Self {
        Self { source, cache }
    }

    /// The cache backing this resolver.
    #[must_use]
    pub const fn cache(&self) -> &Arc<TaxonomyCache> {
        &self.cache
    }

    /// Up to `limit` distinct species codes matching `query`, best first.
    ///
    /// A `limit` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] when nothing matches (including
    /// blank queries) and propagates reference-list load failures.
    pub async fn resolve_codes(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, ProviderError> {
        let entries = self.cache.get_or_load(self.source.as_ref()).await?;
        let codes = distinct_codes(rank_matches(&entries, query), limit.max(1));
        if codes.is_empty() {
            return Err(ProviderError::NotFound {
                query: query.to_owned(),
            });
        }
        log::debug!("resolved {query:?} to species codes {codes:?}");
        Ok(codes)
    }

    /// Up to `limit` entries matching `query`, best first.
    ///
    /// # Errors
    ///
    /// Propagates reference-list load failures.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TaxonomyEntry>, ProviderError> {
        let entries = self.cache.get_or_load(self.source.as_ref()).await?;
        Ok(rank_matches(&entries, query)
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }
}
