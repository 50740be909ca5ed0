//! In-process record store.

use std::sync::Mutex;

use crate::{NewRecord, Record, RecordQuery};

use super::{RecordStore, StoreError, sort_newest_first};

/// Record store keeping every record in memory.
///
/// The store performs a linear scan per query and is intended for tests and
/// short-lived processes.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<Record>>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] when a writer panicked mid-insert.
    pub fn records(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.records.lock()?.clone())
    }

    /// Number of persisted records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] when a writer panicked mid-insert.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.lock()?.len())
    }

    /// Whether nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] when a writer panicked mid-insert.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.records.lock()?.is_empty())
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, record: NewRecord) -> Result<Record, StoreError> {
        let mut records = self.records.lock()?;
        let id = u64::try_from(records.len()).map_or(u64::MAX, |len| len.saturating_add(1));
        let stored = record.into_record(id);
        records.push(stored.clone());
        Ok(stored)
    }

    fn find(&self, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        let mut matching: Vec<Record> = self
            .records
            .lock()?
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        if let Some(limit) = query.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }
}
