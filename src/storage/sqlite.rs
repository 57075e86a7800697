use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{Item, KeyValueStore, MIGRATION_001_INITIAL, StoreError, StoreResult};

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Connect to a SQLite database.
/// Append `?mode=rwc` to the URL to create the file if it doesn't exist.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    SqlitePool::connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Run database migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(MIGRATION_001_INITIAL)
        .execute(pool)
        .await
        .context("Failed to run migration 001")?;
    Ok(())
}

/// Initialize a new database (connect + migrate).
pub async fn init(database_url: &str) -> Result<SqlitePool> {
    let pool = connect(database_url).await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// One logical table of the key/value store, backed by the shared `kv_items`
/// SQLite table. Stores for different namespaces can share a pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    fn row_to_item(row: &SqliteRow) -> StoreResult<Item> {
        let key: String = row.try_get("key").map_err(classify)?;
        let raw: String = row.try_get("value").map_err(classify)?;
        let value = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Permanent(format!("corrupt value for {}: {}", key, e)))?;
        Ok(Item { key, value })
    }
}

const UPSERT: &str = r#"
    INSERT INTO kv_items (namespace, key, value)
    VALUES (?, ?, ?)
    ON CONFLICT (namespace, key) DO UPDATE SET value = excluded.value
"#;

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Item>> {
        let row = sqlx::query("SELECT key, value FROM kv_items WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<HashMap<String, Item>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!(
            "SELECT key, value FROM kv_items WHERE namespace = ? AND key IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(&self.namespace);
        for key in keys {
            query = query.bind(key);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(classify)?;
        rows.iter()
            .map(|row| Self::row_to_item(row).map(|item| (item.key.clone(), item)))
            .collect()
    }

    async fn put(&self, item: Item) -> StoreResult<()> {
        let value = encode(&item)?;
        sqlx::query(UPSERT)
            .bind(&self.namespace)
            .bind(&item.key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn multi_put(&self, items: Vec<Item>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        for item in &items {
            let value = encode(item)?;
            sqlx::query(UPSERT)
                .bind(&self.namespace)
                .bind(&item.key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }
        tx.commit().await.map_err(classify)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM kv_items WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn multi_delete(&self, keys: &[String]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(classify)?;
        for key in keys {
            sqlx::query("DELETE FROM kv_items WHERE namespace = ? AND key = ?")
                .bind(&self.namespace)
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }
        tx.commit().await.map_err(classify)
    }

    async fn scan(&self, prefix: &str) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT key, value FROM kv_items
            WHERE namespace = ? AND substr(key, 1, length(?)) = ?
            ORDER BY key
            "#,
        )
        .bind(&self.namespace)
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;

        rows.iter().map(Self::row_to_item).collect()
    }
}

fn encode(item: &Item) -> StoreResult<String> {
    serde_json::to_string(&item.value)
        .map_err(|e| StoreError::Permanent(format!("cannot encode {}: {}", item.key, e)))
}

/// Busy/locked databases, pool exhaustion and I/O hiccups are worth retrying;
/// everything else is reported as permanent.
fn classify(err: sqlx::Error) -> StoreError {
    let transient = match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    };

    if transient {
        StoreError::Transient(err.to_string())
    } else {
        StoreError::Permanent(err.to_string())
    }
}
