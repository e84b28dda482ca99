//! SQLite-backed store.
//!
//! Each [`Table`] maps to its own SQLite table with a UNIQUE key column and a
//! JSON document column. Upserts run as a single `INSERT .. ON CONFLICT DO
//! UPDATE` statement, so a failed write never leaves a partial row behind.

use super::{key_value, select, Query, Row, Store, StoreError, Table};
use crate::pipeline::record::Document;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Database file created inside the store directory.
pub const DATABASE_FILE: &str = "harvest.db";

const MAX_CONNECTIONS: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Store persisting every table to one SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (or creates) `<dir>/harvest.db` and its tables.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| StoreError::Io { path: dir.display().to_string(), source })?;

        let path = dir.join(DATABASE_FILE);
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS).connect_with(options).await?;

        debug!("Opened store at {}", path.display());
        Self::with_pool(pool).await
    }

    /// In-memory database. A single connection keeps every table visible.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for table in Table::all() {
            let sql = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    row_key TEXT NOT NULL UNIQUE,
                    data TEXT NOT NULL
                )
                "#,
                table.name()
            );
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Default location under the user data directory.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("listing-harvester"))
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert(&self, table: Table, key_field: &str, data: Document) -> Result<Row, StoreError> {
        let key = match key_value(table, key_field, &data)? {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let document = serde_json::to_string(&data)?;

        // json_patch drops null members on insert and removes them on update.
        let sql = format!(
            r#"
            INSERT INTO {} (row_key, data)
            VALUES (?, json_patch('{{}}', ?))
            ON CONFLICT(row_key) DO UPDATE SET
                data = json_patch(data, ?)
            RETURNING id, data
            "#,
            table.name()
        );

        let (id, stored): (i64, String) = sqlx::query_as(&sql)
            .bind(&key)
            .bind(&document)
            .bind(&document)
            .fetch_one(&self.pool)
            .await?;

        Ok(Row { id: id as u64, data: serde_json::from_str(&stored)? })
    }

    async fn query(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        let sql = format!("SELECT id, data FROM {} ORDER BY id", table.name());
        let records: Vec<(i64, String)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let rows = records
            .into_iter()
            .map(|(id, data)| -> Result<Row, StoreError> {
                Ok(Row { id: id as u64, data: serde_json::from_str(&data)? })
            })
            .collect::<Result<Vec<Row>, StoreError>>()?;

        Ok(select(&rows, query))
    }

    async fn count(&self, table: Table) -> Result<usize, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterChainBuilder;
    use crate::store::OrderBy;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_upsert_persists_across_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let store = SqliteStore::open(dir.path()).await.unwrap();
            store
                .upsert(
                    Table::Listings,
                    "item_url",
                    doc(json!({"item_url": "/p/1", "price": 26.46, "team": "Manchester United"})),
                )
                .await
                .unwrap();
            let row = store
                .upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/1", "price": 32.4})))
                .await
                .unwrap();
            assert_eq!(row.id, 1);
            assert_eq!(row.data["team"], json!("Manchester United"));
            store.pool().close().await;
        }

        let store = SqliteStore::open(dir.path()).await.unwrap();
        let rows = store.query(Table::Listings, &Query::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].data["price"], json!(32.4));
        assert_eq!(rows[0].data["team"], json!("Manchester United"));

        let row = store.upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/2"}))).await.unwrap();
        assert_eq!(row.id, 2);
        assert!(dir.path().join(DATABASE_FILE).exists());
    }

    #[tokio::test]
    async fn test_null_field_is_removed() {
        let store = SqliteStore::in_memory().await.unwrap();
        let row = store
            .upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/1", "team": "X", "size": null})))
            .await
            .unwrap();
        assert!(!row.data.contains_key("size"));

        let row = store
            .upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/1", "team": null})))
            .await
            .unwrap();
        assert!(!row.data.contains_key("team"));
        assert_eq!(row.data["item_url"], json!("/p/1"));
    }

    #[tokio::test]
    async fn test_missing_key_writes_nothing() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store.upsert(Table::Narratives, "title_en", doc(json!({"content_en": "x"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingKey { table: Table::Narratives, .. }));
        assert_eq!(store.count(Table::Narratives).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_table_unchanged() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/1", "price": 26.46})))
            .await
            .unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER reject_negative_price BEFORE UPDATE ON listings
            WHEN json_extract(NEW.data, '$.price') < 0
            BEGIN SELECT RAISE(ABORT, 'negative price'); END
            "#,
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            r#"
            CREATE TRIGGER reject_negative_insert BEFORE INSERT ON listings
            WHEN json_extract(NEW.data, '$.price') < 0
            BEGIN SELECT RAISE(ABORT, 'negative price'); END
            "#,
        )
        .execute(store.pool())
        .await
        .unwrap();

        let err = store
            .upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/1", "price": -1.0})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        let err = store
            .upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/2", "price": -1.0})))
            .await;
        assert!(err.is_err());

        assert_eq!(store.count(Table::Listings).await.unwrap(), 1);
        let rows = store.query(Table::Listings, &Query::new()).await.unwrap();
        assert_eq!(rows[0].data["price"], json!(26.46));
    }

    #[tokio::test]
    async fn test_query_filters_orders_and_paginates() {
        let store = SqliteStore::in_memory().await.unwrap();
        for (title, score, era) in [("a", 4, "United"), ("b", 9, "United"), ("c", 7, "Madrid"), ("d", 8, "United")] {
            store
                .upsert(
                    Table::Narratives,
                    "title_en",
                    doc(json!({"title_en": title, "importance_score": score, "era": era})),
                )
                .await
                .unwrap();
        }

        let query = Query::new()
            .filters(FilterChainBuilder::new().field("era", Some("united")).build())
            .order_by(OrderBy::desc("importance_score"))
            .limit(2);
        let rows = store.query(Table::Narratives, &query).await.unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.data["title_en"].clone()).collect();
        assert_eq!(titles, vec![json!("b"), json!("d")]);
        assert_eq!(store.count(Table::Narratives).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_writers_share_one_file() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path()).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..4 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for j in 0..10 {
                    let url = format!("/p/{}", j);
                    store
                        .upsert(Table::Listings, "item_url", doc(json!({"item_url": url, "writer": i})))
                        .await
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count(Table::Listings).await.unwrap(), 10);
    }
}
