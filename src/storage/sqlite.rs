//! SQLite provenance backend.
//!
//! One table, unique on `(vehicle_key, field_name)`. Every write is a single
//! `INSERT ... ON CONFLICT DO UPDATE` statement, so concurrent writers from
//! several processes still leave at most one row per key.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::traits::{ProvenanceBackend, ProvenanceRecord, RecordId, StorageError};
use crate::vehicle::FieldName;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS field_provenance (
    id               TEXT NOT NULL,
    vehicle_key      TEXT NOT NULL,
    field_name       TEXT NOT NULL,
    final_value      REAL,
    low              REAL,
    high             REAL,
    estimate_type    TEXT NOT NULL,
    variant_needed   INTEGER NOT NULL DEFAULT 0,
    confidence_score REAL NOT NULL,
    evidence_weight  REAL NOT NULL,
    evidence_sources TEXT NOT NULL,
    decision_rule    TEXT NOT NULL,
    status           TEXT NOT NULL,
    conditional_facts TEXT NOT NULL,
    warnings         TEXT NOT NULL,
    candidate_digest TEXT NOT NULL DEFAULT '',
    created_at       TEXT NOT NULL,
    UNIQUE (vehicle_key, field_name)
);
CREATE INDEX IF NOT EXISTS idx_field_provenance_created
    ON field_provenance (vehicle_key, field_name, created_at DESC);
";

const UPSERT: &str = "
INSERT INTO field_provenance (
    id, vehicle_key, field_name, final_value, low, high, estimate_type,
    variant_needed, confidence_score, evidence_weight, evidence_sources,
    decision_rule, status, conditional_facts, warnings, candidate_digest,
    created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
ON CONFLICT (vehicle_key, field_name) DO UPDATE SET
    id = excluded.id,
    final_value = excluded.final_value,
    low = excluded.low,
    high = excluded.high,
    estimate_type = excluded.estimate_type,
    variant_needed = excluded.variant_needed,
    confidence_score = excluded.confidence_score,
    evidence_weight = excluded.evidence_weight,
    evidence_sources = excluded.evidence_sources,
    decision_rule = excluded.decision_rule,
    status = excluded.status,
    conditional_facts = excluded.conditional_facts,
    warnings = excluded.warnings,
    candidate_digest = excluded.candidate_digest,
    created_at = excluded.created_at
";

// No created_at cutoff: rows never expire.
const SELECT_LATEST: &str = "
SELECT vehicle_key, field_name, final_value, low, high, estimate_type,
       variant_needed, confidence_score, evidence_weight, evidence_sources,
       decision_rule, status, conditional_facts, warnings, candidate_digest,
       created_at
FROM field_provenance
WHERE vehicle_key = ?1 AND field_name = ?2
ORDER BY created_at DESC
LIMIT 1
";

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::BackendError(e.to_string())
    }
}

fn lock_err() -> StorageError {
    StorageError::BackendError("poisoned lock: sqlite.connection".to_string())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_err(idx, e))
}

/// Enum columns hold the bare snake_case variant name.
fn name_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_value(serde_json::Value::String(text)).map_err(|e| conversion_err(idx, e))
}

/// Fixed-width UTC timestamps so text order equals time order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ProvenanceRecord> {
    let vehicle_key: String = row.get(0)?;
    let field_name: FieldName = name_column(row, 1)?;
    let created_at: String = row.get(15)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| conversion_err(15, e))?
        .with_timezone(&Utc);

    Ok(ProvenanceRecord {
        id: RecordId::for_field(&vehicle_key, field_name),
        final_value: row.get(2)?,
        low: row.get(3)?,
        high: row.get(4)?,
        estimate_type: name_column(row, 5)?,
        variant_needed_for_exact: row.get(6)?,
        confidence_score: row.get(7)?,
        evidence_weight: row.get(8)?,
        evidence_sources: json_column(row, 9)?,
        decision_rule: row.get(10)?,
        status: name_column(row, 11)?,
        conditional_facts: json_column(row, 12)?,
        warnings: json_column(row, 13)?,
        candidate_digest: row.get(14)?,
        created_at,
        vehicle_key,
        field_name,
    })
}

/// Durable provenance backend on a single SQLite connection.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (or create) a database file and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the file cannot be opened and
    /// `BackendError` if the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StorageError::ConnectionError(format!("{}: {e}", path.display())))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ProvenanceBackend for SqliteBackend {
    fn get_latest(
        &self,
        vehicle_key: &str,
        field: FieldName,
    ) -> Result<Option<ProvenanceRecord>, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let mut stmt = conn.prepare_cached(SELECT_LATEST)?;
        match stmt.query_row(params![vehicle_key, field.as_str()], row_to_record) {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(rusqlite::Error::FromSqlConversionFailure(_, _, e)) => {
                Err(StorageError::SerializationError(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&self, record: &ProvenanceRecord) -> Result<RecordId, StorageError> {
        let evidence_sources = to_json(&record.evidence_sources)?;
        let conditional_facts = to_json(&record.conditional_facts)?;
        let warnings = to_json(&record.warnings)?;

        let conn = self.conn.lock().map_err(|_| lock_err())?;
        conn.execute(
            UPSERT,
            params![
                record.id.to_string(),
                record.vehicle_key,
                record.field_name.as_str(),
                record.final_value,
                record.low,
                record.high,
                record.estimate_type.as_str(),
                record.variant_needed_for_exact,
                record.confidence_score,
                record.evidence_weight,
                evidence_sources,
                record.decision_rule,
                record.status.as_str(),
                conditional_facts,
                warnings,
                record.candidate_digest,
                format_timestamp(&record.created_at),
            ],
        )?;
        Ok(record.id)
    }

    fn row_count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().map_err(|_| lock_err())?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM field_provenance", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|e| StorageError::BackendError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::candidate::SearchCandidate;
    use crate::config::ResolverConfig;
    use crate::consensus::ConsensusResolver;

    fn record(value: f64) -> ProvenanceRecord {
        let result = ConsensusResolver::default().resolve(&[
            SearchCandidate::new(value, "kbb", 0.9).unwrap(),
            SearchCandidate::new(value + 10.0, "edmunds", 0.9).unwrap(),
        ]);
        ProvenanceRecord::from_resolution_result(
            "2019|toyota|camry",
            FieldName::CurbWeight,
            &result,
            ResolverConfig::default().write_gate(FieldName::CurbWeight),
        )
    }

    #[test]
    fn round_trip() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let rec = record(3300.0);
        backend.upsert(&rec).unwrap();
        let got = backend
            .get_latest("2019|toyota|camry", FieldName::CurbWeight)
            .unwrap()
            .unwrap();
        assert_eq!(got.id, rec.id);
        assert_eq!(got.final_value, rec.final_value);
        assert_eq!(got.evidence_sources, rec.evidence_sources);
        assert_eq!(got.status, rec.status);
        assert_eq!(got.estimate_type, rec.estimate_type);
        assert_eq!(got.candidate_digest, rec.candidate_digest);
        assert_eq!(
            got.created_at.timestamp_micros(),
            rec.created_at.timestamp_micros()
        );
    }

    #[test]
    fn upsert_keeps_one_row() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.upsert(&record(3300.0)).unwrap();
        backend.upsert(&record(3400.0)).unwrap();
        assert_eq!(backend.row_count().unwrap(), 1);
        let got = backend
            .get_latest("2019|toyota|camry", FieldName::CurbWeight)
            .unwrap()
            .unwrap();
        assert_eq!(got.low, Some(3400.0));
    }

    #[test]
    fn two_year_old_row_is_returned() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let mut old = record(3300.0);
        old.created_at = Utc::now() - Duration::days(730);
        backend.upsert(&old).unwrap();
        assert!(backend
            .get_latest("2019|toyota|camry", FieldName::CurbWeight)
            .unwrap()
            .is_some());
    }

    #[test]
    fn unknown_key_is_none() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert!(backend
            .get_latest("1999|ford|taurus", FieldName::CurbWeight)
            .unwrap()
            .is_none());
    }
}
