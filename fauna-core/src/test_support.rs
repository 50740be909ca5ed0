//! Test doubles for the provider lifecycle and record stores.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{
    DataSource, NewRecord, Provider, ProviderError, Record, RecordQuery, RecordStore, StoreError,
    TransportError,
};

/// Provider returning a canned payload or error.
///
/// The raw payload is the list of items itself and normalization
/// upper-cases each item, so tests can tell the two stored forms apart.
#[derive(Debug)]
pub struct StubProvider {
    response: Result<Vec<String>, TransportError>,
    source: DataSource,
    fetches: AtomicUsize,
}

impl StubProvider {
    /// Provider whose fetch returns `items`.
    #[must_use]
    pub fn with_items(items: Vec<String>) -> Self {
        Self {
            response: Ok(items),
            source: DataSource::Facts,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Provider whose fetch fails with `error`.
    #[must_use]
    pub fn with_error(error: TransportError) -> Self {
        Self {
            response: Err(error),
            source: DataSource::Facts,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Report `source` instead of [`DataSource::Facts`].
    #[must_use]
    pub fn for_source(mut self, source: DataSource) -> Self {
        self.source = source;
        self
    }

    /// Number of fetches performed so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for StubProvider {
    type Params = str;
    type Raw = Vec<String>;
    type Item = String;

    fn source(&self) -> DataSource {
        self.source
    }

    async fn fetch(&self, _params: &str) -> Result<Vec<String>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.response.clone().map_err(ProviderError::from)
    }

    fn normalize(&self, raw: &Vec<String>) -> Vec<String> {
        raw.iter().map(|item| item.to_uppercase()).collect()
    }
}

/// Record store rejecting every operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingRecordStore;

impl RecordStore for FailingRecordStore {
    fn insert(&self, _record: NewRecord) -> Result<Record, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn find(&self, _query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        Err(StoreError::Poisoned)
    }
}
