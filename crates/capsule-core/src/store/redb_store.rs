// ============================================================================
// RedbStore - Embedded structured store (redb)
// ============================================================================
// Durable local storage for the game snapshot.
// Default path: ~/.capsule/capsule.redb (override via CAPSULE_DB_PATH env var)
// ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redb::{Database, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::KeyValueStore;
use crate::config::default_data_dir;

// Table definitions
const STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");

/// Embedded database holding the structured game state
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses CAPSULE_DB_PATH env var or ~/.capsule/capsule.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            p.to_path_buf()
        } else if let Ok(env_path) = std::env::var("CAPSULE_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let dir = default_data_dir()?;
            std::fs::create_dir_all(&dir)
                .map_err(|e| anyhow!("Failed to create {}: {}", dir.display(), e))?;
            dir.join("capsule.redb")
        };

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure the table exists by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(STATE)
                .map_err(|e| anyhow!("Failed to create state table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        info!("Database ready");

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored keys in order
    pub fn keys(&self) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(STATE)
            .map_err(|e| anyhow!("Failed to open state table: {}", e))?;

        let mut keys = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate state: {}", e))?;
        for entry in iter {
            let (key, _value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(STATE)
            .map_err(|e| anyhow!("Failed to open state table: {}", e))?;

        match table.get(key).map_err(|e| anyhow!("Failed to get {}: {}", key, e))? {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    /// Insert every entry inside a single write transaction
    fn write_all(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(STATE)
                .map_err(|e| anyhow!("Failed to open state table: {}", e))?;
            for (key, value) in entries {
                table.insert(*key, *value)
                    .map_err(|e| anyhow!("Failed to insert {}: {}", key, e))?;
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored {} keys in one transaction", entries.len());
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for RedbStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.read(key)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.write_all(&[(key, value)])
    }

    async fn set_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        self.write_all(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.redb");

        {
            let store = RedbStore::open(Some(&path)).unwrap();
            assert!(store.get("balance").await.unwrap().is_none());
            store.set("balance", &[1, 2, 3]).await.unwrap();
            store.set("balance", &[4]).await.unwrap();
        }

        let store = RedbStore::open(Some(&path)).unwrap();
        assert_eq!(store.get("balance").await.unwrap(), Some(vec![4]));
        assert_eq!(store.keys().unwrap(), vec!["balance".to_string()]);
        assert_eq!(store.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_batch_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(Some(&dir.path().join("state.redb"))).unwrap();

        let batch: [(&str, &[u8]); 3] = [("inventory", &[9]), ("balance", &[1, 2]), ("daily_bonus", &[0])];
        store.set_many(&batch).await.unwrap();

        assert_eq!(store.get("inventory").await.unwrap(), Some(vec![9]));
        assert_eq!(store.get("balance").await.unwrap(), Some(vec![1, 2]));
        assert_eq!(store.keys().unwrap(), vec!["balance", "daily_bonus", "inventory"]);
    }
}
