//! Core domain types for the fauna ETL layer.
//!
//! Every external data source is wrapped by a [`Provider`] that fetches a raw
//! payload, normalizes it into canonical items and records both forms in a
//! [`RecordStore`]. The canonical item shapes ([`Observation`],
//! [`LocationResult`], [`Detection`], [`AnimalFacts`]) and the error taxonomy
//! shared by all providers live here so that storage and transport adapters
//! can depend on them without pulling in HTTP clients.

#![forbid(unsafe_code)]

mod animal;
mod error;
mod location;
mod observation;
mod provider;
mod record;
pub mod store;
mod taxonomy;

#[doc(hidden)]
pub mod test_support;

pub use animal::{AnimalFacts, Classification, Detection};
pub use error::{ProviderError, TransportError};
pub use location::{LocationLookup, LocationMap, LocationResult};
pub use observation::{Observation, dedup_by_id};
pub use provider::{Provider, RunSummary, run_provider};
pub use record::{
    DataSource, NewRecord, PAYLOAD_KIND_TAG, ParseDataSourceError, PayloadKind, Record,
    RecordQuery, RecordStatus,
};
pub use store::{MemoryRecordStore, RecordStore, StoreError};
pub use taxonomy::TaxonomyEntry;

#[cfg(feature = "store-sqlite")]
pub use store::SqliteRecordStore;
