//! In-memory provenance backend.
//!
//! Thread-safe and process-local. Intended for embedded usage, tests, and
//! as a reference implementation of [`ProvenanceBackend`].

use std::collections::HashMap;
use std::sync::RwLock;

use crate::storage::traits::{ProvenanceBackend, ProvenanceRecord, RecordId, StorageError};
use crate::vehicle::FieldName;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Rows keyed by `(vehicle_key, field)`; an upsert replaces the value.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    rows: RwLock<HashMap<(String, FieldName), ProvenanceRecord>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProvenanceBackend for InMemoryBackend {
    fn get_latest(
        &self,
        vehicle_key: &str,
        field: FieldName,
    ) -> Result<Option<ProvenanceRecord>, StorageError> {
        let rows = self.rows.read().map_err(|_| lock_err("provenance.rows"))?;
        Ok(rows.get(&(vehicle_key.to_string(), field)).cloned())
    }

    fn upsert(&self, record: &ProvenanceRecord) -> Result<RecordId, StorageError> {
        let mut rows = self.rows.write().map_err(|_| lock_err("provenance.rows"))?;
        rows.insert(
            (record.vehicle_key.clone(), record.field_name),
            record.clone(),
        );
        Ok(record.id)
    }

    fn row_count(&self) -> Result<usize, StorageError> {
        let rows = self.rows.read().map_err(|_| lock_err("provenance.rows"))?;
        Ok(rows.len())
    }
}
