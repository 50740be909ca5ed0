//! SQLite-backed record store.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, Row, Transaction, params};
use serde_json::Value;

use crate::{DataSource, NewRecord, Record, RecordQuery, RecordStatus};

use super::{RecordStore, StoreError};

/// Append-only record store persisted in a SQLite database.
///
/// Timestamps are stored as milliseconds since the Unix epoch. Payloads and
/// tags are stored as JSON text.
pub struct SqliteRecordStore {
    connection: Mutex<Connection>,
}

impl fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRecordStore").finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Open (or create) a store at `path`, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OpenDatabase`] when the file cannot be opened and
    /// [`StoreError::Schema`] when the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let connection = Connection::open(path).map_err(|source| StoreError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(connection)
    }

    /// Create a store backed by a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Schema`] when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        Self::with_connection(connection)
    }

    fn with_connection(mut connection: Connection) -> Result<Self, StoreError> {
        initialise_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn insert(&self, record: NewRecord) -> Result<Record, StoreError> {
        let payload = record.payload().map(serde_json::to_string).transpose()?;
        let tags = serde_json::to_string(record.tags())?;
        let kind = record.payload_kind().map(|kind| kind.as_str());
        let connection = self.connection.lock()?;
        let mut statement = connection.prepare_cached(
            "INSERT INTO records (source, payload, payload_kind, fetched_at_ms, status, error_message, tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        statement.execute(params![
            record.source().as_str(),
            payload,
            kind,
            to_millis(record.fetched_at()),
            record.status().as_str(),
            record.error_message(),
            tags,
        ])?;
        let id = u64::try_from(connection.last_insert_rowid()).map_err(|_| StoreError::Corrupt {
            id: 0,
            message: "SQLite returned a negative row id".to_owned(),
        })?;
        Ok(record.into_record(id))
    }

    fn find(&self, query: &RecordQuery) -> Result<Vec<Record>, StoreError> {
        let since = query.since.map(to_millis);
        let kind = query.payload_kind.map(|kind| kind.as_str());
        let status = query.status.map(RecordStatus::as_str);
        // SQLite treats a negative LIMIT as unbounded.
        let limit = query
            .limit
            .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));

        let connection = self.connection.lock()?;
        let mut statement = connection.prepare_cached(
            "SELECT id, source, payload, fetched_at_ms, status, error_message, tags
             FROM records
             WHERE source = ?1
               AND (?2 IS NULL OR fetched_at_ms >= ?2)
               AND (?3 IS NULL OR payload_kind = ?3)
               AND (?4 IS NULL OR status = ?4)
             ORDER BY fetched_at_ms DESC, id DESC
             LIMIT ?5",
        )?;
        let mut rows = statement.query(params![query.source.as_str(), since, kind, status, limit])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(decode_row(row)?);
        }
        Ok(records)
    }
}

fn decode_row(row: &Row<'_>) -> Result<Record, StoreError> {
    let raw_id: i64 = row.get(0)?;
    let id = u64::try_from(raw_id).map_err(|_| StoreError::Corrupt {
        id: 0,
        message: format!("negative row id {raw_id}"),
    })?;
    let corrupt = |message: String| StoreError::Corrupt { id, message };

    let source_text: String = row.get(1)?;
    let source: DataSource = source_text
        .parse()
        .map_err(|err: crate::ParseDataSourceError| corrupt(err.to_string()))?;
    let payload_text: Option<String> = row.get(2)?;
    let payload = payload_text
        .map(|text| serde_json::from_str::<Value>(&text))
        .transpose()
        .map_err(|err| corrupt(format!("invalid payload JSON: {err}")))?;
    let fetched_at_ms: i64 = row.get(3)?;
    let status_text: String = row.get(4)?;
    let status = RecordStatus::parse(&status_text)
        .ok_or_else(|| corrupt(format!("unknown status {status_text:?}")))?;
    let error_message: Option<String> = row.get(5)?;
    let tags_text: String = row.get(6)?;
    let tags: BTreeMap<String, String> = serde_json::from_str(&tags_text)
        .map_err(|err| corrupt(format!("invalid tags JSON: {err}")))?;

    Ok(Record {
        id,
        source,
        payload,
        fetched_at: from_millis(fetched_at_ms),
        status,
        error_message,
        tags,
    })
}

fn to_millis(instant: SystemTime) -> i64 {
    instant
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

fn from_millis(millis: i64) -> SystemTime {
    let elapsed = Duration::from_millis(u64::try_from(millis).unwrap_or(0));
    UNIX_EPOCH + elapsed
}

fn initialise_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let transaction = connection
        .transaction()
        .map_err(|source| StoreError::Schema {
            step: "begin schema transaction",
            source,
        })?;

    run_migration_step(
        &transaction,
        "create records table",
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            payload TEXT,
            payload_kind TEXT,
            fetched_at_ms INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('success', 'failed')),
            error_message TEXT,
            tags TEXT NOT NULL DEFAULT '{}',
            CHECK ((status = 'failed') = (error_message IS NOT NULL))
        )",
    )?;
    run_migration_step(
        &transaction,
        "create records source index",
        "CREATE INDEX IF NOT EXISTS records_source_fetched_at
            ON records (source, fetched_at_ms DESC)",
    )?;

    transaction.commit().map_err(|source| StoreError::Schema {
        step: "commit schema transaction",
        source,
    })
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), StoreError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| StoreError::Schema { step, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PayloadKind;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    #[fixture]
    fn store() -> SqliteRecordStore {
        SqliteRecordStore::open_in_memory().expect("open in-memory store")
    }

    #[rstest]
    fn round_trips_payload_tags_and_status(store: SqliteRecordStore) {
        let inserted = store
            .insert(
                NewRecord::success(
                    DataSource::BirdObservations,
                    PayloadKind::Normalized,
                    json!([{"observationId": "OBS1"}]),
                )
                .with_tag("region", "US"),
            )
            .expect("insert");

        let found = store
            .find(&RecordQuery::new(DataSource::BirdObservations))
            .expect("find");

        assert_eq!(found.len(), 1);
        let record = &found[0];
        assert_eq!(record.id, inserted.id);
        assert_eq!(record.payload, Some(json!([{"observationId": "OBS1"}])));
        assert_eq!(record.payload_kind(), Some(PayloadKind::Normalized));
        assert_eq!(record.tags.get("region").map(String::as_str), Some("US"));
        assert_eq!(record.status, RecordStatus::Success);
    }

    #[rstest]
    fn failed_records_keep_null_payload(store: SqliteRecordStore) {
        store
            .insert(NewRecord::failed(DataSource::Facts, "NINJAS_API_KEY is not set"))
            .expect("insert");

        let found = store
            .find(&RecordQuery::new(DataSource::Facts).status(RecordStatus::Failed))
            .expect("find");

        assert_eq!(found.len(), 1);
        assert!(found[0].payload.is_none());
        assert_eq!(
            found[0].error_message.as_deref(),
            Some("NINJAS_API_KEY is not set")
        );
    }

    #[rstest]
    fn find_applies_window_kind_and_limit(store: SqliteRecordStore) {
        let now = SystemTime::now();
        let day = Duration::from_secs(86_400);
        for (age, kind) in [
            (day * 40, PayloadKind::Normalized),
            (day * 2, PayloadKind::Raw),
            (day * 2, PayloadKind::Normalized),
            (day, PayloadKind::Normalized),
        ] {
            store
                .insert(
                    NewRecord::success(DataSource::BirdObservations, kind, json!([]))
                        .at(now - age),
                )
                .expect("insert");
        }

        let query = RecordQuery::new(DataSource::BirdObservations)
            .since(now - day * 30)
            .payload_kind(PayloadKind::Normalized)
            .limit(5);
        let found = store.find(&query).expect("find");

        assert_eq!(found.len(), 2);
        assert!(found[0].fetched_at >= found[1].fetched_at);
        assert!(
            found
                .iter()
                .all(|record| record.payload_kind() == Some(PayloadKind::Normalized))
        );
    }

    #[rstest]
    fn records_survive_reopening() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("records.sqlite3");
        {
            let store = SqliteRecordStore::open(&path).expect("open store");
            store
                .insert(NewRecord::failed(DataSource::Geocoding, "timeout"))
                .expect("insert");
        }

        let reopened = SqliteRecordStore::open(&path).expect("reopen store");
        let found = reopened
            .find(&RecordQuery::new(DataSource::Geocoding))
            .expect("find");
        assert_eq!(found.len(), 1);
    }

    #[rstest]
    fn open_reports_unreachable_paths() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("missing").join("records.sqlite3");
        let err = SqliteRecordStore::open(&path).expect_err("parent directory is missing");
        assert!(matches!(err, StoreError::OpenDatabase { .. }));
    }
}
