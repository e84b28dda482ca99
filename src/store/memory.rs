//! In-process store, used for tests and dry runs.

use super::{Query, Row, Store, StoreError, Table, TableState};
use crate::pipeline::record::Document;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Store holding every table in memory behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, TableState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert(&self, table: Table, key_field: &str, data: Document) -> Result<Row, StoreError> {
        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        tables.entry(table).or_default().upsert(table, key_field, data)
    }

    async fn query(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.get(&table).map(|state| state.query(query)).unwrap_or_default())
    }

    async fn count(&self, table: Table) -> Result<usize, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.get(&table).map_or(0, |state| state.rows().len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_same_url_twice_keeps_one_row() {
        let store = MemoryStore::new();
        store
            .upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/1", "price": 10.0})))
            .await
            .unwrap();
        store
            .upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/1", "price": 12.0})))
            .await
            .unwrap();

        assert_eq!(store.count(Table::Listings).await.unwrap(), 1);
        let rows = store.query(Table::Listings, &Query::new()).await.unwrap();
        assert_eq!(rows[0].data["price"], json!(12.0));
    }

    #[tokio::test]
    async fn test_tables_are_separate_namespaces() {
        let store = MemoryStore::new();
        store.upsert(Table::Listings, "item_url", doc(json!({"item_url": "/p/1"}))).await.unwrap();
        store
            .upsert(Table::LegacyListings, "legacy_url", doc(json!({"legacy_url": "/p/1"})))
            .await
            .unwrap();

        assert_eq!(store.count(Table::Listings).await.unwrap(), 1);
        assert_eq!(store.count(Table::LegacyListings).await.unwrap(), 1);
        assert_eq!(store.count(Table::Narratives).await.unwrap(), 0);
        assert!(store.query(Table::Narratives, &Query::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for j in 0..25 {
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

        assert_eq!(store.count(Table::Listings).await.unwrap(), 25);
    }
}
