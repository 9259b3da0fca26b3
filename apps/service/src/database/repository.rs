use anyhow::Result;
use async_trait::async_trait;
use libsql::params;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::pool::{LibsqlManager, LibsqlPool};

/// Collection holding check records
pub const CHECKS: &str = "checks";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("record {collection}/{id} does not exist")]
    NotFound { collection: String, id: String },

    #[error("record {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },
}

/// Record store the worker reads checks from and writes them back to
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Ids of every record in `collection`
    async fn list(&self, collection: &str) -> Result<Vec<String>>;

    /// Read a record, `None` when it does not exist
    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Create a record; fails with [`StoreError::AlreadyExists`]
    async fn create(&self, collection: &str, id: &str, record: &Value) -> Result<()>;

    /// Replace an existing record; fails with [`StoreError::NotFound`]
    async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<()>;

    /// Delete a record; fails with [`StoreError::NotFound`]
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

/// LibSQL database implementation
pub struct LibsqlDataStore {
    pool: LibsqlPool,
}

impl LibsqlDataStore {
    /// Create a new store from a pool whose schema is already migrated
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn not_found(collection: &str, id: &str) -> StoreError {
    StoreError::NotFound { collection: collection.to_string(), id: id.to_string() }
}

#[async_trait]
impl DataStore for LibsqlDataStore {
    async fn list(&self, collection: &str) -> Result<Vec<String>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT id FROM records WHERE collection = ? ORDER BY id",
                params![collection.to_string()],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }

        Ok(ids)
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT body FROM records WHERE collection = ? AND id = ?",
                params![collection.to_string(), id.to_string()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let body: String = row.get(0)?;

        // A corrupt body is a malformed record, not a failed read.
        match serde_json::from_str(&body) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(collection, id, "Stored record is not valid JSON: {}", e);
                Ok(Some(Value::Null))
            }
        }
    }

    async fn create(&self, collection: &str, id: &str, record: &Value) -> Result<()> {
        let conn = self.get_conn().await?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO records (collection, id, body, updated_at) VALUES (?, ?, ?, ?)",
                params![
                    collection.to_string(),
                    id.to_string(),
                    serde_json::to_string(record)?,
                    chrono::Utc::now().timestamp_millis()
                ],
            )
            .await?;

        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<()> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE records SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
                params![
                    serde_json::to_string(record)?,
                    chrono::Utc::now().timestamp_millis(),
                    collection.to_string(),
                    id.to_string()
                ],
            )
            .await?;

        if updated == 0 {
            return Err(not_found(collection, id).into());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute(
                "DELETE FROM records WHERE collection = ? AND id = ?",
                params![collection.to_string(), id.to_string()],
            )
            .await?;

        if deleted == 0 {
            return Err(not_found(collection, id).into());
        }
        Ok(())
    }
}
