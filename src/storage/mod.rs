//! Provenance storage.
//!
//! [`ProvenanceStore`] is the permanent cache the engine writes to; it sits
//! in front of any [`ProvenanceBackend`].

mod memory;
mod provenance;
#[cfg(feature = "persistent")]
mod sqlite;
mod traits;

pub use memory::InMemoryBackend;
pub use provenance::ProvenanceStore;
#[cfg(feature = "persistent")]
pub use sqlite::SqliteBackend;
pub use traits::{ProvenanceBackend, ProvenanceRecord, RecordId, StorageError};
