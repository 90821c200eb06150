//! Permanent provenance cache.
//!
//! Reads go to a per-process memory map first, then to the backend; a
//! backend hit populates the map. Nothing expires. Invalidation is explicit
//! and only drops entries from the memory map.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::consensus::ResolutionResult;
use crate::evidence::WriteGate;
use crate::storage::memory::InMemoryBackend;
use crate::storage::traits::{ProvenanceBackend, ProvenanceRecord, RecordId, StorageError};
use crate::vehicle::FieldName;

type CacheKey = (String, FieldName);

/// Provenance store with an in-memory front cache.
pub struct ProvenanceStore {
    backend: Arc<dyn ProvenanceBackend>,
    memory: RwLock<HashMap<CacheKey, ProvenanceRecord>>,
}

impl std::fmt::Debug for ProvenanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.memory.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("ProvenanceStore")
            .field("cached", &cached)
            .finish_non_exhaustive()
    }
}

impl Default for ProvenanceStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ProvenanceStore {
    /// Store over an explicit backend.
    #[must_use]
    pub fn new(backend: Arc<dyn ProvenanceBackend>) -> Self {
        Self {
            backend,
            memory: RwLock::new(HashMap::new()),
        }
    }

    /// Store backed only by process memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Store backed by a SQLite file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    #[cfg(feature = "persistent")]
    pub fn sqlite(path: impl AsRef<std::path::Path>) -> Result<Self, StorageError> {
        Ok(Self::new(Arc::new(crate::storage::sqlite::SqliteBackend::open(
            path,
        )?)))
    }

    /// Latest record for a vehicle/field.
    ///
    /// Backend failures are logged and reported as a miss.
    #[must_use]
    pub fn get_record(&self, vehicle_key: &str, field: FieldName) -> Option<ProvenanceRecord> {
        let key = (vehicle_key.to_string(), field);
        if let Ok(memory) = self.memory.read() {
            if let Some(record) = memory.get(&key) {
                debug!(vehicle = vehicle_key, field = %field, "Provenance memory hit");
                return Some(record.clone());
            }
        }

        match self.backend.get_latest(vehicle_key, field) {
            Ok(Some(record)) => {
                debug!(vehicle = vehicle_key, field = %field, "Provenance backend hit");
                if let Ok(mut memory) = self.memory.write() {
                    memory.insert(key, record.clone());
                }
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    vehicle = vehicle_key,
                    field = %field,
                    error = %e,
                    "Provenance lookup failed; treating as cache miss"
                );
                None
            }
        }
    }

    /// Latest consensus result for a vehicle/field.
    #[must_use]
    pub fn get(&self, vehicle_key: &str, field: FieldName) -> Option<ResolutionResult> {
        self.get_record(vehicle_key, field)
            .map(|r| r.to_resolution_result())
    }

    /// Upsert a record and refresh the memory map.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the memory map is left untouched then.
    pub fn put_record(&self, record: ProvenanceRecord) -> Result<RecordId, StorageError> {
        let id = self.backend.upsert(&record)?;
        info!(
            vehicle = %record.vehicle_key,
            field = %record.field_name,
            status = %record.status,
            confidence = record.confidence_score,
            "Provenance stored"
        );
        let mut memory = self
            .memory
            .write()
            .map_err(|_| StorageError::BackendError("poisoned lock: provenance.memory".into()))?;
        memory.insert((record.vehicle_key.clone(), record.field_name), record);
        Ok(id)
    }

    /// Upsert a consensus result.
    ///
    /// `gate` decides the stored status; see
    /// [`ProvenanceRecord::from_resolution_result`].
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    pub fn put(
        &self,
        vehicle_key: &str,
        field: FieldName,
        result: &ResolutionResult,
        gate: WriteGate,
    ) -> Result<RecordId, StorageError> {
        self.put_record(ProvenanceRecord::from_resolution_result(vehicle_key, field, result, gate))
    }

    /// Drop cached fields of a vehicle from the memory map.
    ///
    /// `None` drops every field. The backend is not touched.
    pub fn invalidate(&self, vehicle_key: &str, field: Option<FieldName>) {
        let Ok(mut memory) = self.memory.write() else {
            return;
        };
        match field {
            Some(f) => {
                memory.remove(&(vehicle_key.to_string(), f));
            }
            None => memory.retain(|(key, _), _| key != vehicle_key),
        }
        debug!(vehicle = vehicle_key, field = ?field, "Provenance invalidated");
    }

    /// Number of entries in the memory map.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.memory.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Backend in use.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ProvenanceBackend> {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SearchCandidate;
    use crate::config::ResolverConfig;
    use crate::consensus::ConsensusResolver;

    const KEY: &str = "2019|toyota|camry";

    fn gate() -> WriteGate {
        ResolverConfig::default().write_gate(FieldName::CurbWeight)
    }

    fn result(value: f64) -> ResolutionResult {
        ConsensusResolver::default().resolve(&[
            SearchCandidate::new(value, "kbb", 0.9).unwrap(),
            SearchCandidate::new(value, "edmunds", 0.9).unwrap(),
        ])
    }

    struct FailingBackend;

    impl ProvenanceBackend for FailingBackend {
        fn get_latest(
            &self,
            _vehicle_key: &str,
            _field: FieldName,
        ) -> Result<Option<ProvenanceRecord>, StorageError> {
            Err(StorageError::ConnectionError("database is locked".into()))
        }

        fn upsert(&self, _record: &ProvenanceRecord) -> Result<RecordId, StorageError> {
            Err(StorageError::ConnectionError("database is locked".into()))
        }

        fn row_count(&self) -> Result<usize, StorageError> {
            Ok(0)
        }
    }

    #[test]
    fn put_then_get() {
        let store = ProvenanceStore::in_memory();
        store.put(KEY, FieldName::CurbWeight, &result(3300.0), gate()).unwrap();
        let got = store.get(KEY, FieldName::CurbWeight).unwrap();
        assert_eq!(got.final_value, 3300.0);
    }

    #[test]
    fn backend_hit_populates_memory() {
        let backend = Arc::new(InMemoryBackend::new());
        let record = ProvenanceRecord::from_resolution_result(
            KEY,
            FieldName::CurbWeight,
            &result(3300.0),
            gate(),
        );
        backend.upsert(&record).unwrap();

        let store = ProvenanceStore::new(backend);
        assert_eq!(store.cached_len(), 0);
        assert!(store.get(KEY, FieldName::CurbWeight).is_some());
        assert_eq!(store.cached_len(), 1);
    }

    #[test]
    fn invalidate_touches_memory_only() {
        let store = ProvenanceStore::in_memory();
        store.put(KEY, FieldName::CurbWeight, &result(3300.0), gate()).unwrap();
        store.put(KEY, FieldName::AluminumRims, &result(1.0), gate()).unwrap();
        store.put("2020|honda|accord", FieldName::CurbWeight, &result(3200.0), gate()).unwrap();

        store.invalidate(KEY, Some(FieldName::CurbWeight));
        assert_eq!(store.cached_len(), 2);
        store.invalidate(KEY, None);
        assert_eq!(store.cached_len(), 1);

        assert_eq!(store.backend().row_count().unwrap(), 3);
        // served again from the backend
        assert!(store.get(KEY, FieldName::CurbWeight).is_some());
    }

    #[test]
    fn backend_failure_is_a_miss() {
        let store = ProvenanceStore::new(Arc::new(FailingBackend));
        assert!(store.get(KEY, FieldName::CurbWeight).is_none());
        let err = store
            .put(KEY, FieldName::CurbWeight, &result(3300.0), gate())
            .unwrap_err();
        assert!(matches!(err, StorageError::ConnectionError(_)));
        assert_eq!(store.cached_len(), 0);
    }
}
