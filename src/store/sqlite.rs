use std::path::Path;
use std::sync::Mutex;

use log::{debug, info};
use rusqlite::{params, Connection};

use super::MedicationStore;
use crate::error::StoreError;
use crate::model::MedicationRecord;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS medicamentos (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    nombre TEXT NOT NULL,
    stock  INTEGER NOT NULL CHECK (stock >= 0),
    costo  REAL NOT NULL CHECK (costo >= 0),
    marca  TEXT NOT NULL
)";

/// SQLite-backed store over the `medicamentos` table.
///
/// `LIKE` folds case for ASCII letters only, so accented capitals must match
/// the stored spelling.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Opening medication database at {}", path.display());
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Mutex::new(conn),
        }
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM medicamentos", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn insert(&self, record: &MedicationRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO medicamentos (nombre, stock, costo, marca) VALUES (?1, ?2, ?3, ?4)",
            params![record.name, record.stock, record.cost, record.brand],
        )?;
        Ok(())
    }

    /// Insert `records` in one transaction, but only into an empty table.
    ///
    /// Returns the number of rows inserted.
    pub fn seed(&self, records: &[MedicationRecord]) -> Result<usize, StoreError> {
        if self.count()? > 0 {
            debug!("Medication table already populated, skipping seed");
            return Ok(0);
        }

        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO medicamentos (nombre, stock, costo, marca) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in records {
                stmt.execute(params![record.name, record.stock, record.cost, record.brand])?;
            }
        }
        tx.commit()?;

        info!("Seeded medication table with {} records", records.len());
        Ok(records.len())
    }

    pub fn seed_demo_catalog(&self) -> Result<usize, StoreError> {
        self.seed(&super::demo_catalog())
    }
}

impl MedicationStore for SqliteStore {
    fn lookup(&self, fragment: &str) -> Result<Vec<MedicationRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut stmt = conn.prepare_cached(
            "SELECT nombre, stock, costo, marca FROM medicamentos
             WHERE nombre LIKE ?1 ESCAPE '\\'
             ORDER BY nombre",
        )?;

        let pattern = format!("%{}%", escape_like(fragment));
        let rows = stmt.query_map(params![pattern], |row| {
            Ok(MedicationRecord {
                name: row.get(0)?,
                stock: row.get(1)?,
                cost: row.get(2)?,
                brand: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        debug!("Lookup '{}' matched {} record(s)", fragment, records.len());
        Ok(records)
    }
}

/// Escape LIKE wildcards so the fragment is matched literally.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::demo_catalog;

    fn store_with(records: &[MedicationRecord]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        for record in records {
            store.insert(record).unwrap();
        }
        store
    }

    #[test]
    fn test_lookup_substring_case_insensitive() {
        let store = store_with(&[MedicationRecord::new("Paracetamol 500mg", 10, 2.5, "Genfar")]);

        let matches = store.lookup("paracetamol").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].stock, 10);
        assert_eq!(matches[0].brand, "Genfar");

        assert!(store.lookup("Zzzyx").unwrap().is_empty());
    }

    #[test]
    fn test_lookup_returns_every_match_sorted() {
        let store = store_with(&[
            MedicationRecord::new("Ibuprofeno 800mg", 3, 5.0, "MK"),
            MedicationRecord::new("Ibuprofeno 400mg", 12, 3.2, "Genfar"),
            MedicationRecord::new("Omeprazol 20mg", 4, 6.0, "La Santé"),
        ]);

        let names: Vec<String> = store
            .lookup("IBUPROFENO")
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Ibuprofeno 400mg", "Ibuprofeno 800mg"]);
    }

    #[test]
    fn test_wildcards_are_literal() {
        let store = store_with(&[MedicationRecord::new("Aspirina 100mg", 5, 1.0, "Bayer")]);
        assert!(store.lookup("%").unwrap().is_empty());
        assert!(store.lookup("Aspirin_").unwrap().is_empty());
        assert_eq!(store.lookup("Aspirina").unwrap().len(), 1);
    }

    #[test]
    fn test_seed_only_into_empty_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();

        let catalog = demo_catalog();
        assert_eq!(store.seed(&catalog).unwrap(), catalog.len());
        assert_eq!(store.seed(&catalog).unwrap(), 0);
        assert_eq!(store.count().unwrap(), catalog.len() as u64);
    }

    #[test]
    fn test_negative_stock_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        let conn = store.conn.lock().unwrap();
        let result = conn.execute(
            "INSERT INTO medicamentos (nombre, stock, costo, marca) VALUES ('X', -1, 1.0, 'Y')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
