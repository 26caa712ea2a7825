use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use trackmeds_common::{Error, Result};
use tracing::{debug, info};

use crate::migrations::{MIGRATIONS, MIGRATIONS_TABLE};

/// Flat durable store of opaque string blobs, read and written whole.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Push buffered writes to durable storage.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// SQLite-backed [`KeyValueStore`] with a single `kv_store` table.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening key-value store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Storage(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("failed to open in-memory database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(MIGRATIONS_TABLE)
            .map_err(|e| Error::Storage(format!("failed to create migrations table: {e}")))?;

        let current: u32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::Storage(format!("failed to read schema version: {e}")))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            debug!("applying migration {} ({})", migration.version, migration.name);
            conn.execute_batch(migration.sql)
                .map_err(|e| Error::Storage(format!("migration {} failed: {e}", migration.name)))?;
            conn.execute(
                "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
                params![migration.version, migration.name],
            )
            .map_err(|e| Error::Storage(format!("failed to record migration: {e}")))?;
        }

        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("database lock poisoned".into()))
    }

    fn get_sync(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Storage(format!("failed to read {key}: {e}")))
    }

    fn set_sync(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )
        .map_err(|e| Error::Storage(format!("failed to write {key}: {e}")))?;
        Ok(())
    }

    fn remove_sync(&self, keys: &[&str]) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("failed to begin transaction: {e}")))?;
        for key in keys {
            tx.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                .map_err(|e| Error::Storage(format!("failed to remove {key}: {e}")))?;
        }
        tx.commit()
            .map_err(|e| Error::Storage(format!("failed to commit removal: {e}")))
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_sync(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_sync(key, value)
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.remove_sync(keys)
    }

    async fn flush(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .map_err(|e| Error::Storage(format!("failed to checkpoint database: {e}")))
    }
}
