//! SQL backing store
//!
//! Keys live in a two-column table; the QA feed is an append-only table
//! trimmed to its cap after every insert.

use crate::backend::BackingStore;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement, Value,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

const CREATE_KV: &str =
    "CREATE TABLE IF NOT EXISTS tripwire_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)";
const CREATE_LIST: &str = "CREATE TABLE IF NOT EXISTS tripwire_list (\
     id INTEGER PRIMARY KEY AUTOINCREMENT, key TEXT NOT NULL, value TEXT NOT NULL)";
const CREATE_LIST_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_tripwire_list_key ON tripwire_list (key, id)";

/// Backing store over a SQL database (SQLite by default)
pub struct SqlStore {
    connection: DatabaseConnection,
    backend: DbBackend,
    operation_timeout: Duration,
}

impl SqlStore {
    /// Connect, bounded by `connect_timeout`, and make sure the tables exist
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        operation_timeout: Duration,
    ) -> StorageResult<Self> {
        info!("Connecting to backing store: {}", url);

        let mut opts = ConnectOptions::new(url.to_owned());
        opts.max_connections(4)
            .min_connections(1)
            .connect_timeout(connect_timeout)
            .acquire_timeout(operation_timeout)
            .sqlx_logging(false);

        let connection = tokio::time::timeout(connect_timeout, Database::connect(opts))
            .await
            .map_err(|_| StorageError::Timeout("connect"))?
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let store = Self {
            backend: connection.get_database_backend(),
            connection,
            operation_timeout,
        };
        store.ensure_schema().await?;

        debug!("Backing store ready");
        Ok(store)
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        for sql in [CREATE_KV, CREATE_LIST, CREATE_LIST_INDEX] {
            self.bounded("ensure_schema", async {
                self.connection
                    .execute(Statement::from_string(self.backend, sql))
                    .await
            })
            .await?;
        }
        Ok(())
    }

    fn statement<I>(&self, sql: &str, values: I) -> Statement
    where
        I: IntoIterator<Item = Value>,
    {
        Statement::from_sql_and_values(self.backend, sql, values)
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = Result<T, sea_orm::DbErr>>,
    {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| StorageError::Timeout(operation))?
            .map_err(StorageError::from)
    }
}

#[async_trait]
impl BackingStore for SqlStore {
    fn name(&self) -> &str {
        "sql"
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let stmt = self.statement(
            "INSERT INTO tripwire_kv (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key.into(), value.into()],
        );
        self.bounded("set", self.connection.execute(stmt)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let stmt = self.statement("SELECT value FROM tripwire_kv WHERE key = ?", [key.into()]);
        let row = self.bounded("get", self.connection.query_one(stmt)).await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<String>("", "value")?)),
            None => Ok(None),
        }
    }

    async fn push_capped(&self, key: &str, value: String, max_len: usize) -> StorageResult<()> {
        let insert = self.statement(
            "INSERT INTO tripwire_list (key, value) VALUES (?, ?)",
            [key.into(), value.into()],
        );
        self.bounded("push", self.connection.execute(insert)).await?;

        let trim = self.statement(
            "DELETE FROM tripwire_list WHERE key = ? AND id NOT IN \
             (SELECT id FROM tripwire_list WHERE key = ? ORDER BY id DESC LIMIT ?)",
            [key.into(), key.into(), (max_len as i64).into()],
        );
        self.bounded("trim", self.connection.execute(trim)).await?;
        Ok(())
    }

    async fn list_recent(&self, key: &str, limit: usize) -> StorageResult<Vec<String>> {
        let stmt = self.statement(
            "SELECT value FROM tripwire_list WHERE key = ? ORDER BY id DESC LIMIT ?",
            [key.into(), (limit.min(i64::MAX as usize) as i64).into()],
        );
        let rows = self.bounded("list", self.connection.query_all(stmt)).await?;
        rows.iter()
            .map(|row| row.try_get::<String>("", "value").map_err(StorageError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (SqlStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("store.db").display());
        let store = SqlStore::connect(&url, Duration::from_secs(2), Duration::from_secs(2))
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let (store, _dir) = temp_store().await;
        assert_eq!(store.get("run:status").await.unwrap(), None);

        store.set("run:status", "{\"a\":1}".to_string()).await.unwrap();
        store.set("run:status", "{\"a\":2}".to_string()).await.unwrap();
        assert_eq!(
            store.get("run:status").await.unwrap().as_deref(),
            Some("{\"a\":2}")
        );
    }

    #[tokio::test]
    async fn test_list_is_capped_and_newest_first() {
        let (store, _dir) = temp_store().await;
        for n in 0..8 {
            store.push_capped("qa:feed", n.to_string(), 5).await.unwrap();
        }
        let all = store.list_recent("qa:feed", 100).await.unwrap();
        assert_eq!(all, vec!["7", "6", "5", "4", "3"]);
        assert_eq!(store.list_recent("qa:feed", 2).await.unwrap(), vec!["7", "6"]);
    }

    #[tokio::test]
    async fn test_unreachable_database_fails_to_connect() {
        let result = SqlStore::connect(
            "sqlite:///nonexistent-tripwire-dir/nested/store.db?mode=rwc",
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
        .await;
        assert!(result.is_err());
    }
}
