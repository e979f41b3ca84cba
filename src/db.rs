//! SQLite persistence for the id inventory and operation logs.

use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

use crate::ids::{IdError, InventoryStore};
use crate::models::{Operation, OperationLog};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Operation log not found: {0}")]
    LogNotFound(i64),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS persistent_ids (
    id TEXT PRIMARY KEY NOT NULL
);
CREATE TABLE IF NOT EXISTS operation_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_path TEXT NOT NULL,
    from_revision TEXT NOT NULL,
    to_revision TEXT NOT NULL,
    product_identity_id TEXT,
    language TEXT,
    operations TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_operation_logs_file ON operation_logs(file_path);
";

/// SQLite-backed store for persistent ids and operation logs.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// All persistent ids, sorted.
    pub fn load_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id FROM persistent_ids ORDER BY id")?;
        let mut rows = stmt.query([])?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    /// Replace the stored id set.
    pub fn replace_ids(&mut self, ids: &[String]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM persistent_ids", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO persistent_ids (id) VALUES (?1)")?;
            for id in ids {
                stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Store an operation log, returning its row id.
    pub fn save_operation_log(&self, log: &OperationLog) -> Result<i64, StoreError> {
        let operations = serde_json::to_string(&log.operations)?;
        self.conn.execute(
            "INSERT INTO operation_logs
                (file_path, from_revision, to_revision, product_identity_id, language, operations)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.file_path,
                log.from_revision,
                log.to_revision,
                log.product_identity_id,
                log.language,
                operations
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(
            "Saved {} operations for {} ({}..{}) as log {}",
            log.operations.len(),
            log.file_path,
            log.from_revision,
            log.to_revision,
            id
        );
        Ok(id)
    }

    pub fn load_operation_log(&self, id: i64) -> Result<OperationLog, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT file_path, from_revision, to_revision, product_identity_id, language, operations
                 FROM operation_logs WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let (file_path, from_revision, to_revision, product_identity_id, language, operations) =
            row.ok_or(StoreError::LogNotFound(id))?;
        let operations: Vec<Operation> = serde_json::from_str(&operations)?;

        Ok(OperationLog {
            file_path,
            from_revision,
            to_revision,
            product_identity_id,
            language,
            operations,
        })
    }

    /// All logs for one file in insertion order (oldest revision step first).
    pub fn load_operation_logs_for_file(&self, file_path: &str) -> Result<Vec<OperationLog>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM operation_logs WHERE file_path = ?1 ORDER BY id")?;
        let mut rows = stmt.query([file_path])?;

        let mut ids: Vec<i64> = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }

        ids.into_iter().map(|id| self.load_operation_log(id)).collect()
    }
}

impl InventoryStore for SqliteStore {
    fn load(&mut self) -> Result<Vec<String>, IdError> {
        let ids = self.load_ids()?;
        debug!("Loaded {} ids from SQLite inventory", ids.len());
        Ok(ids)
    }

    fn persist(&mut self, inventory: &[String]) -> Result<(), IdError> {
        self.replace_ids(inventory)?;
        debug!("Persisted {} ids to SQLite inventory", inventory.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PersistentIdGenerator;
    use crate::models::{AffectedElement, OperationType};

    fn sample_log(from: &str, to: &str) -> OperationLog {
        OperationLog {
            file_path: "content/eng/doc.at".to_string(),
            from_revision: from.to_string(),
            to_revision: to.to_string(),
            product_identity_id: Some("1234".to_string()),
            language: None,
            operations: vec![Operation {
                operation_id: "op1".to_string(),
                operation_type: OperationType::Insert,
                after_stid: Some("abcd".to_string()),
                affected_stids: vec![AffectedElement::new("efgh", "", "new text")],
            }],
        }
    }

    #[test]
    fn test_ids_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .replace_ids(&["abcd".to_string(), "efgh".to_string()])
            .unwrap();
        assert_eq!(store.load_ids().unwrap(), vec!["abcd", "efgh"]);

        store.replace_ids(&["zzzz".to_string()]).unwrap();
        assert_eq!(store.load_ids().unwrap(), vec!["zzzz"]);
    }

    #[test]
    fn test_generator_with_sqlite_inventory() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.replace_ids(&["abcd".to_string()]).unwrap();

        let mut generator = PersistentIdGenerator::seeded(store, 5);
        let ids = generator.generate(4).unwrap();

        let stored = generator.store().load_ids().unwrap();
        assert_eq!(stored.len(), 5);
        for id in &ids {
            assert!(stored.contains(id));
        }
    }

    #[test]
    fn test_operation_log_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let log = sample_log("r1", "r2");
        let id = store.save_operation_log(&log).unwrap();

        assert_eq!(store.load_operation_log(id).unwrap(), log);
    }

    #[test]
    fn test_logs_for_file_in_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save_operation_log(&sample_log("r1", "r2")).unwrap();
        store.save_operation_log(&sample_log("r2", "r3")).unwrap();

        let logs = store.load_operation_logs_for_file("content/eng/doc.at").unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].to_revision, "r2");
        assert_eq!(logs[1].to_revision, "r3");
        assert!(store.load_operation_logs_for_file("other").unwrap().is_empty());
    }

    #[test]
    fn test_missing_log() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.load_operation_log(99),
            Err(StoreError::LogNotFound(99))
        ));
    }
}
