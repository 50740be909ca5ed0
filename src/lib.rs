//! Facade crate for the fauna ETL layer.
//!
//! This crate re-exports the core record, provider and item types, and
//! exposes the upstream providers and the SQLite record store behind
//! feature flags.

#![forbid(unsafe_code)]

pub use fauna_core::{
    AnimalFacts, Classification, DataSource, Detection, LocationLookup, LocationMap,
    LocationResult, MemoryRecordStore, NewRecord, Observation, PayloadKind, Provider,
    ProviderError, Record, RecordQuery, RecordStatus, RecordStore, RunSummary, StoreError,
    TaxonomyEntry, TransportError, run_provider,
};

#[cfg(feature = "store-sqlite")]
pub use fauna_core::SqliteRecordStore;

#[cfg(feature = "providers")]
pub use fauna_data::{
    EbirdConfig, EbirdProvider, FactsConfig, FactsProvider, GeocodingConfig, GeocodingProvider,
    HttpClientConfig, HttpTransport, ImageRecognitionConfig, ImageRecognitionProvider,
    ImageUpload, ObservationQuery, ReqwestTransport, RetryPolicy, SpeciesResolver, TaxonomyCache,
};

/// Multi-provider flows such as animal range maps and image identification.
#[cfg(feature = "providers")]
pub use fauna_data::enrichment;
