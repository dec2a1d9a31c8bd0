//! Read-only medication stock lookups.

mod catalog;
mod sqlite;

pub use self::catalog::demo_catalog;
pub use self::sqlite::SqliteStore;

use crate::error::StoreError;
use crate::model::MedicationRecord;

/// Case-insensitive substring lookup over medication records.
///
/// Implementations are synchronous; async callers run them on the blocking
/// pool.
pub trait MedicationStore: Send + Sync {
    /// All records whose name contains `fragment`, ignoring case.
    fn lookup(&self, fragment: &str) -> Result<Vec<MedicationRecord>, StoreError>;
}

/// Store backed by a plain vector, matched with Unicode-aware lowercasing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Vec<MedicationRecord>,
}

impl InMemoryStore {
    pub fn new(records: Vec<MedicationRecord>) -> Self {
        InMemoryStore { records }
    }
}

impl MedicationStore for InMemoryStore {
    fn lookup(&self, fragment: &str) -> Result<Vec<MedicationRecord>, StoreError> {
        let needle = fragment.to_lowercase();
        Ok(self
            .records
            .iter()
            .filter(|record| record.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}
