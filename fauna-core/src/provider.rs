//! The lifecycle shared by every external data provider.
//!
//! A [`Provider`] knows how to fetch one upstream payload and how to
//! normalize it. [`run_provider`] owns the rest of the lifecycle: it stores
//! the raw and normalized forms on success, stores a failed record
//! otherwise, and always hands back a [`RunSummary`] instead of an error.

use async_trait::async_trait;
use serde::Serialize;

use crate::{DataSource, NewRecord, PayloadKind, ProviderError, RecordStatus, RecordStore};

/// An external data source with a fetch and normalize step.
///
/// `fetch` may fail; `normalize` must not. Missing or malformed upstream
/// fields degrade to defaults or are omitted.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Input for a single fetch, e.g. a query string.
    type Params: ?Sized + Sync;
    /// Upstream payload as received.
    type Raw: Serialize + Send + Sync;
    /// Canonical item produced by normalization.
    type Item: Serialize + Send;

    /// Source recorded on every stored record.
    fn source(&self) -> DataSource;

    /// Perform the outbound call(s) for `params`.
    async fn fetch(&self, params: &Self::Params) -> Result<Self::Raw, ProviderError>;

    /// Extract canonical items from a raw payload.
    fn normalize(&self, raw: &Self::Raw) -> Vec<Self::Item>;
}

/// Outcome of [`run_provider`].
///
/// Serialises as `{"status":"success","item_count":N}` or
/// `{"status":"failed","error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunSummary {
    /// The payload was fetched, normalized and stored.
    Success {
        /// Number of normalized items.
        item_count: usize,
    },
    /// The run failed and a failed record was stored.
    Failed {
        /// Failure description.
        error: String,
    },
}

impl RunSummary {
    /// Status matching the records written by the run.
    #[must_use]
    pub const fn status(&self) -> RecordStatus {
        match self {
            Self::Success { .. } => RecordStatus::Success,
            Self::Failed { .. } => RecordStatus::Failed,
        }
    }

    /// Whether the run succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Fetch, normalize and store one payload.
///
/// On success two records are appended: one tagged raw and one tagged
/// normalized. Any failure appends a single failed record with a null
/// payload. The function never returns an error; a store that also refuses
/// the failed record is logged.
pub async fn run_provider<P>(
    provider: &P,
    params: &P::Params,
    store: &dyn RecordStore,
) -> RunSummary
where
    P: Provider + ?Sized,
{
    let source = provider.source();
    match execute(provider, params, store).await {
        Ok(item_count) => {
            log::info!("{source} run stored {item_count} normalized items");
            RunSummary::Success { item_count }
        }
        Err(err) => {
            let error = err.to_string();
            log::error!("{source} run failed: {error}");
            if let Err(store_err) = store.insert(NewRecord::failed(source, error.clone())) {
                log::error!("failed to record {source} failure: {store_err}");
            }
            RunSummary::Failed { error }
        }
    }
}

async fn execute<P>(
    provider: &P,
    params: &P::Params,
    store: &dyn RecordStore,
) -> Result<usize, ProviderError>
where
    P: Provider + ?Sized,
{
    let source = provider.source();
    let raw = provider.fetch(params).await?;
    let items = provider.normalize(&raw);
    let raw_payload = serde_json::to_value(&raw).map_err(crate::StoreError::from)?;
    let normalized_payload = serde_json::to_value(&items).map_err(crate::StoreError::from)?;
    store.insert(NewRecord::success(source, PayloadKind::Raw, raw_payload))?;
    store.insert(NewRecord::success(
        source,
        PayloadKind::Normalized,
        normalized_payload,
    ))?;
    Ok(items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingRecordStore, StubProvider};
    use crate::{MemoryRecordStore, RecordQuery, TransportError};
    use rstest::rstest;
    use serde_json::json;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build Tokio runtime")
            .block_on(future)
    }

    #[rstest]
    fn summary_serialises_with_status_tag() {
        let success = serde_json::to_value(RunSummary::Success { item_count: 3 }).expect("encode");
        let failed = serde_json::to_value(RunSummary::Failed {
            error: "boom".into(),
        })
        .expect("encode");
        assert_eq!(success, json!({"status": "success", "item_count": 3}));
        assert_eq!(failed, json!({"status": "failed", "error": "boom"}));
    }

    #[rstest]
    fn successful_runs_store_raw_and_normalized_records() {
        let store = MemoryRecordStore::new();
        let provider = StubProvider::with_items(vec!["a".into(), "b".into()]);

        let summary = block_on(run_provider(&provider, "query", &store));

        assert_eq!(summary, RunSummary::Success { item_count: 2 });
        let records = store.records().expect("records");
        let kinds: Vec<_> = records.iter().map(|r| r.payload_kind()).collect();
        assert_eq!(kinds, vec![Some(PayloadKind::Raw), Some(PayloadKind::Normalized)]);
    }

    #[rstest]
    fn failed_runs_store_one_failed_record() {
        let store = MemoryRecordStore::new();
        let provider = StubProvider::with_error(TransportError::Http {
            url: "https://api.example.test".into(),
            status: 503,
            message: "unavailable".into(),
        });

        let summary = block_on(run_provider(&provider, "query", &store));

        assert_eq!(summary.status(), RecordStatus::Failed);
        let failed = store
            .find(&RecordQuery::new(provider.source()))
            .expect("find");
        assert_eq!(failed.len(), 1);
        assert!(failed[0].payload.is_none());
        assert!(failed[0].error_message.as_deref().is_some_and(|m| m.contains("503")));
    }

    #[rstest]
    fn store_failures_surface_as_failed_summary() {
        let provider = StubProvider::with_items(vec!["a".into()]);
        let summary = block_on(run_provider(&provider, "query", &FailingRecordStore));
        assert!(!summary.is_success());
    }
}
