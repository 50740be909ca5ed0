//! Persisted units of provider output.
//!
//! A [`Record`] captures one outcome of a provider run: a raw upstream
//! payload, a normalized item list, or a failure message. Records are
//! append-only; stores assign identifiers but never rewrite existing rows.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Tag key carrying the [`PayloadKind`] of a record.
pub const PAYLOAD_KIND_TAG: &str = "payload-kind";

/// External system a record originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSource {
    /// Species detection from uploaded images.
    ImageRecognition,
    /// Animal facts lookup by name.
    Facts,
    /// Forward and reverse geocoding.
    Geocoding,
    /// Recent bird observation records.
    BirdObservations,
}

impl DataSource {
    /// All known sources, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::ImageRecognition,
        Self::Facts,
        Self::Geocoding,
        Self::BirdObservations,
    ];

    /// Stable identifier used when persisting the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImageRecognition => "image-recognition",
            Self::Facts => "facts",
            Self::Geocoding => "geocoding",
            Self::BirdObservations => "bird-observations",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`DataSource`] identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown data source {0:?}")]
pub struct ParseDataSourceError(pub String);

impl FromStr for DataSource {
    type Err = ParseDataSourceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == normalized)
            .ok_or_else(|| ParseDataSourceError(value.to_owned()))
    }
}

/// Outcome recorded for a provider run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// The payload was fetched and stored.
    Success,
    /// The run failed; the record carries an error message and no payload.
    Failed,
}

impl RecordStatus {
    /// Stable identifier used when persisting the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parse a persisted status identifier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Whether a payload holds the upstream response or canonical items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// Upstream response as received.
    Raw,
    /// Canonical item list produced by normalization.
    Normalized,
}

impl PayloadKind {
    /// Stable identifier stored under [`PAYLOAD_KIND_TAG`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Normalized => "normalized",
        }
    }

    /// Parse a persisted payload kind identifier.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "raw" => Some(Self::Raw),
            "normalized" => Some(Self::Normalized),
            _ => None,
        }
    }
}

/// A record awaiting insertion into a [`RecordStore`](crate::RecordStore).
///
/// Only [`NewRecord::success`] and [`NewRecord::failed`] construct values,
/// which keeps `error_message` present exactly when the status is
/// [`RecordStatus::Failed`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    source: DataSource,
    payload: Option<Value>,
    fetched_at: SystemTime,
    status: RecordStatus,
    error_message: Option<String>,
    tags: BTreeMap<String, String>,
}

impl NewRecord {
    /// Describe a successfully fetched payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use fauna_core::{DataSource, NewRecord, PayloadKind, RecordStatus};
    /// use serde_json::json;
    ///
    /// let record = NewRecord::success(DataSource::Facts, PayloadKind::Raw, json!([]));
    /// assert_eq!(record.status(), RecordStatus::Success);
    /// assert_eq!(record.payload_kind(), Some(PayloadKind::Raw));
    /// ```
    #[must_use]
    pub fn success(source: DataSource, kind: PayloadKind, payload: Value) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(PAYLOAD_KIND_TAG.to_owned(), kind.as_str().to_owned());
        Self {
            source,
            payload: Some(payload),
            fetched_at: SystemTime::now(),
            status: RecordStatus::Success,
            error_message: None,
            tags,
        }
    }

    /// Describe a failed fetch with a null payload.
    ///
    /// Failed records carry no [`PAYLOAD_KIND_TAG`]: there is no payload
    /// whose kind could be recorded.
    #[must_use]
    pub fn failed(source: DataSource, message: impl Into<String>) -> Self {
        Self {
            source,
            payload: None,
            fetched_at: SystemTime::now(),
            status: RecordStatus::Failed,
            error_message: Some(message.into()),
            tags: BTreeMap::new(),
        }
    }

    /// Attach a metadata tag.
    ///
    /// [`PAYLOAD_KIND_TAG`] is owned by the constructors; attempts to set it
    /// here are ignored.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key == PAYLOAD_KIND_TAG {
            log::warn!("ignoring attempt to override the {PAYLOAD_KIND_TAG} tag");
            return self;
        }
        self.tags.insert(key, value.into());
        self
    }

    /// Override the creation timestamp.
    #[must_use]
    pub fn at(mut self, fetched_at: SystemTime) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// Source the record belongs to.
    #[must_use]
    pub const fn source(&self) -> DataSource {
        self.source
    }

    /// Payload to persist, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn fetched_at(&self) -> SystemTime {
        self.fetched_at
    }

    /// Run outcome.
    #[must_use]
    pub const fn status(&self) -> RecordStatus {
        self.status
    }

    /// Failure description for failed records.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Metadata tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Payload kind recorded under [`PAYLOAD_KIND_TAG`].
    #[must_use]
    pub fn payload_kind(&self) -> Option<PayloadKind> {
        self.tags
            .get(PAYLOAD_KIND_TAG)
            .map(String::as_str)
            .and_then(PayloadKind::parse)
    }

    /// Materialise the record with a store-assigned identifier.
    #[must_use]
    pub fn into_record(self, id: u64) -> Record {
        Record {
            id,
            source: self.source,
            payload: self.payload,
            fetched_at: self.fetched_at,
            status: self.status,
            error_message: self.error_message,
            tags: self.tags,
        }
    }
}

/// A persisted provider outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Store-assigned identifier, increasing with insertion order.
    pub id: u64,
    /// Originating source.
    pub source: DataSource,
    /// Raw or normalized payload; `None` for failed runs.
    pub payload: Option<Value>,
    /// Creation timestamp.
    pub fetched_at: SystemTime,
    /// Run outcome.
    pub status: RecordStatus,
    /// Failure description, present iff `status` is failed.
    pub error_message: Option<String>,
    /// Free-form metadata; successful records carry [`PAYLOAD_KIND_TAG`].
    pub tags: BTreeMap<String, String>,
}

impl Record {
    /// Payload kind recorded under [`PAYLOAD_KIND_TAG`].
    #[must_use]
    pub fn payload_kind(&self) -> Option<PayloadKind> {
        self.tags
            .get(PAYLOAD_KIND_TAG)
            .map(String::as_str)
            .and_then(PayloadKind::parse)
    }
}

/// Filters applied by [`RecordStore::find`](crate::RecordStore::find).
///
/// Results are always ordered by `fetched_at` descending, newest identifier
/// first when timestamps tie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Source to read.
    pub source: DataSource,
    /// Only records created at or after this instant.
    pub since: Option<SystemTime>,
    /// Only records tagged with this payload kind.
    pub payload_kind: Option<PayloadKind>,
    /// Only records with this status.
    pub status: Option<RecordStatus>,
    /// Maximum number of records returned.
    pub limit: Option<usize>,
}

impl RecordQuery {
    /// Query every record of `source`.
    #[must_use]
    pub const fn new(source: DataSource) -> Self {
        Self {
            source,
            since: None,
            payload_kind: None,
            status: None,
            limit: None,
        }
    }

    /// Restrict to records created at or after `since`.
    #[must_use]
    pub const fn since(mut self, since: SystemTime) -> Self {
        self.since = Some(since);
        self
    }

    /// Restrict to records tagged with `kind`.
    #[must_use]
    pub const fn payload_kind(mut self, kind: PayloadKind) -> Self {
        self.payload_kind = Some(kind);
        self
    }

    /// Restrict to records with `status`.
    #[must_use]
    pub const fn status(mut self, status: RecordStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Cap the number of returned records.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` satisfies every filter except the limit.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        record.source == self.source
            && self.since.is_none_or(|since| record.fetched_at >= since)
            && self
                .payload_kind
                .is_none_or(|kind| record.payload_kind() == Some(kind))
            && self.status.is_none_or(|status| record.status == status)
    }
}
