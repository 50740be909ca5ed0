//! Animal facts lookups by common name.
//!
//! Multi-word names that find nothing are retried with their last word
//! ("snow leopard" becomes "leopard"), and the broader results are narrowed
//! back to names containing the original query when any do.

use std::sync::Arc;

use async_trait::async_trait;
use fauna_core::{
    AnimalFacts, DataSource, Provider, ProviderError, RecordStore, RunSummary, run_provider,
};
use serde_json::Value;

use crate::fields;
use crate::http::{HttpRequest, HttpTransport, endpoint};

/// Default facts service.
pub const DEFAULT_FACTS_URL: &str = "https://api.api-ninjas.com/v1/animals";

/// Variable naming the facts API key.
pub const API_KEY_VARIABLE: &str = "NINJAS_API_KEY";

/// Settings for [`FactsProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactsConfig {
    /// Key sent as `X-Api-Key`.
    pub api_key: Option<String>,
    /// Endpoint queried with `?name=`.
    pub base_url: String,
}

impl Default for FactsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_FACTS_URL.to_owned(),
        }
    }
}

impl FactsConfig {
    /// Default settings using `api_key`.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            ..Self::default()
        }
    }

    /// Override the endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Animal facts provider.
pub struct FactsProvider<T> {
    transport: Arc<T>,
    config: FactsConfig,
}

impl<T> std::fmt::Debug for FactsProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactsProvider")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

impl<T: HttpTransport> FactsProvider<T> {
    /// Provider calling the service through `transport`.
    #[must_use]
    pub const fn new(transport: Arc<T>, config: FactsConfig) -> Self {
        Self { transport, config }
    }

    /// Fetch, normalize and store the facts for `name`.
    pub async fn run(&self, name: &str, store: &dyn RecordStore) -> RunSummary {
        run_provider(self, name, store).await
    }

    /// Normalized facts for `name`.
    ///
    /// # Errors
    ///
    /// Fails like [`Provider::fetch`].
    pub async fn lookup(&self, name: &str) -> Result<Vec<AnimalFacts>, ProviderError> {
        let raw = self.fetch(name).await?;
        Ok(self.normalize(&raw))
    }

    async fn query(&self, api_key: &str, name: &str) -> Result<Vec<Value>, ProviderError> {
        let request = HttpRequest::get(endpoint(&self.config.base_url, &[])?)
            .with_query("name", name)
            .with_header("X-Api-Key", api_key);
        log::debug!("looking up facts for {name:?}");
        Ok(self.transport.send(request).await?.json()?)
    }
}

fn last_word(name: &str) -> Option<&str> {
    let mut words = name.split_whitespace();
    let last = words.next_back()?;
    words.next().is_some().then_some(last)
}

/// Lower-cased `text` with runs of whitespace folded to single spaces.
fn folded(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn narrow_to_query(results: Vec<Value>, query: &str) -> Vec<Value> {
    let needle = folded(query);
    let matching: Vec<Value> = results
        .iter()
        .filter(|item| fields::text(item, "name").is_some_and(|name| folded(&name).contains(&needle)))
        .cloned()
        .collect();
    if matching.is_empty() {
        results
    } else {
        matching
    }
}

fn facts(item: &Value) -> Option<AnimalFacts> {
    Some(AnimalFacts {
        name: fields::text(item, "name")?,
        taxonomy: fields::text_map(item, "taxonomy"),
        locations: fields::text_list(item, "locations"),
        characteristics: fields::text_map(item, "characteristics"),
    })
}

#[async_trait]
impl<T: HttpTransport> Provider for FactsProvider<T> {
    type Params = str;
    type Raw = Vec<Value>;
    type Item = AnimalFacts;

    fn source(&self) -> DataSource {
        DataSource::Facts
    }

    async fn fetch(&self, name: &str) -> Result<Vec<Value>, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProviderError::MissingCredential {
                provider: DataSource::Facts,
                variable: API_KEY_VARIABLE,
            })?;

        let results = self.query(api_key, name).await?;
        if !results.is_empty() {
            return Ok(results);
        }
        let Some(fallback) = last_word(name) else {
            return Ok(results);
        };
        log::info!("no facts for {name:?}; retrying with {fallback:?}");
        let broader = self.query(api_key, fallback).await?;
        Ok(narrow_to_query(broader, name))
    }

    fn normalize(&self, raw: &Vec<Value>) -> Vec<AnimalFacts> {
        raw.iter().filter_map(facts).collect()
    }
}
