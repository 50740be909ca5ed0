//! External data providers for the fauna ETL layer.
//!
//! Responsibilities:
//! - Talk to the upstream APIs through the [`http::HttpTransport`] seam.
//! - Normalize upstream payloads into the canonical shapes of `fauna-core`.
//! - Persist raw and normalized payloads through a
//!   [`RecordStore`](fauna_core::RecordStore).
//!
//! Boundaries:
//! - Canonical types, the provider lifecycle and storage live in `fauna-core`.
//! - Scheduling and request routing belong to callers.
//!
//! Invariants:
//! - No global mutable state; the taxonomy cache is owned and injected.
//! - `normalize` never fails; malformed upstream fields degrade to defaults.

#![forbid(unsafe_code)]

pub mod ebird;
pub mod enrichment;
pub mod facts;
mod fields;
pub mod geocoding;
pub mod http;
pub mod recognition;
pub mod regions;
pub mod taxonomy;

#[doc(hidden)]
pub mod test_support;

pub use ebird::{EbirdConfig, EbirdProvider, ObservationQuery};
pub use facts::{FactsConfig, FactsProvider};
pub use geocoding::{GeocodingConfig, GeocodingProvider};
pub use http::{HttpClientConfig, HttpTransport, ReqwestTransport, RetryPolicy};
pub use recognition::{ImageRecognitionConfig, ImageRecognitionProvider, ImageUpload};
pub use taxonomy::{HttpTaxonomySource, SpeciesResolver, TaxonomyCache, TaxonomySource};
