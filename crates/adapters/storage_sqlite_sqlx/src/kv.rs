//! String key to string value table.

use sqlx::SqlitePool;

use crate::error::StorageError;

const SELECT: &str = "SELECT value FROM kv WHERE key = ?";
const UPSERT: &str =
    "INSERT INTO kv (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value";
const DELETE: &str = "DELETE FROM kv WHERE key = ?";

/// `SQLite`-backed key-value store shared by the repositories.
#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] when the query fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as(SELECT)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] when the query fails.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] when the query fails.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query(DELETE).bind(key).execute(&self.pool).await?;
        Ok(())
    }
}
