//! Append-only persistence for provider records.
//!
//! The [`RecordStore`] trait is the only storage seam providers see. Stores
//! accept [`NewRecord`] values, assign identifiers and answer
//! [`RecordQuery`] lookups ordered newest first. There is no update or
//! delete path: repeated runs accumulate history.

#[cfg(feature = "store-sqlite")]
use std::path::PathBuf;

use thiserror::Error;

use crate::{NewRecord, Record, RecordQuery};

mod memory;
#[cfg(feature = "store-sqlite")]
mod sqlite;

pub use memory::MemoryRecordStore;
#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteRecordStore;

/// Append-only record persistence.
///
/// # Examples
///
/// ```
/// use fauna_core::{DataSource, MemoryRecordStore, NewRecord, PayloadKind, RecordQuery, RecordStore};
/// use serde_json::json;
///
/// let store = MemoryRecordStore::default();
/// store.insert(NewRecord::success(DataSource::Facts, PayloadKind::Raw, json!([])))?;
/// let found = store.find(&RecordQuery::new(DataSource::Facts))?;
/// assert_eq!(found.len(), 1);
/// # Ok::<(), fauna_core::StoreError>(())
/// ```
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return it with its assigned identifier.
    fn insert(&self, record: NewRecord) -> Result<Record, StoreError>;

    /// Return records matching `query`, newest first.
    fn find(&self, query: &RecordQuery) -> Result<Vec<Record>, StoreError>;
}

/// Errors raised by [`RecordStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A writer panicked while holding the store lock.
    #[error("record store lock was poisoned")]
    Poisoned,
    /// A payload or tag map could not be encoded.
    #[error("failed to serialise record: {0}")]
    Serialize(#[from] serde_json::Error),
    /// A persisted row could not be decoded.
    #[error("record {id} is corrupt: {message}")]
    Corrupt {
        /// Identifier of the offending record.
        id: u64,
        /// Description of the problem.
        message: String,
    },
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating the record schema failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to {step}: {source}")]
    Schema {
        /// Migration step that failed.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Generic SQLite error when reading or writing rows.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::Poisoned
    }
}

/// Order records newest first, breaking timestamp ties by identifier.
pub(crate) fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|left, right| {
        right
            .fetched_at
            .cmp(&left.fetched_at)
            .then_with(|| right.id.cmp(&left.id))
    });
}
