//! Upsert-capable document storage.
//!
//! Rows are keyed by a uniqueness field per table. Upserting an existing key
//! overwrites every incoming field and keeps the row id; fields absent from
//! the incoming document are left untouched, and a `null` field is removed.

pub mod memory;
pub mod sqlite;

use crate::filters::FilterChain;
use crate::pipeline::record::Document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Logical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Listings,
    LegacyListings,
    Narratives,
}

impl Table {
    pub fn all() -> &'static [Table] {
        &[Table::Listings, Table::LegacyListings, Table::Narratives]
    }

    /// Field that uniquely identifies a row.
    pub fn key_field(&self) -> &'static str {
        match self {
            Table::Listings => "item_url",
            Table::LegacyListings => "legacy_url",
            Table::Narratives => "title_en",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Table::Listings => "listings",
            Table::LegacyListings => "legacy_listings",
            Table::Narratives => "narratives",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: u64,
    #[serde(flatten)]
    pub data: Document,
}

/// Errors returned by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document for {table} is missing key field `{field}`")]
    MissingKey { table: Table, field: String },

    #[error("store I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Sort order for queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), descending: true }
    }

    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), descending: false }
    }
}

/// Filtered, ordered, paginated read.
#[derive(Default)]
pub struct Query {
    pub filters: FilterChain,
    pub order: Option<OrderBy>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Storage seam shared by every pipeline. Implementations synchronize internally.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts or merges `data` into the row whose `key_field` matches.
    /// A failed upsert leaves the table unchanged.
    async fn upsert(&self, table: Table, key_field: &str, data: Document) -> Result<Row, StoreError>;

    /// Reads rows matching the query.
    async fn query(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Number of rows in a table.
    async fn count(&self, table: Table) -> Result<usize, StoreError>;
}

/// Value of the key field, or `MissingKey` when it is absent or blank.
pub(crate) fn key_value<'a>(
    table: Table,
    key_field: &str,
    data: &'a Document,
) -> Result<&'a Value, StoreError> {
    match data.get(key_field) {
        Some(value) if !is_blank(value) => Ok(value),
        _ => Err(StoreError::MissingKey { table, field: key_field.to_string() }),
    }
}

/// In-memory rows of one table.
#[derive(Debug, Default, Clone)]
pub(crate) struct TableState {
    rows: Vec<Row>,
    next_id: u64,
}

impl TableState {
    pub(crate) fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub(crate) fn upsert(
        &mut self,
        table: Table,
        key_field: &str,
        data: Document,
    ) -> Result<Row, StoreError> {
        let key = key_value(table, key_field, &data)?.clone();

        if let Some(row) = self.rows.iter_mut().find(|row| row.data.get(key_field) == Some(&key)) {
            for (field, value) in data {
                if value.is_null() {
                    row.data.remove(&field);
                } else {
                    row.data.insert(field, value);
                }
            }
            return Ok(row.clone());
        }

        let id = self.next_id.max(1);
        self.next_id = id + 1;
        let data = data.into_iter().filter(|(_, value)| !value.is_null()).collect();
        let row = Row { id, data };
        self.rows.push(row.clone());
        Ok(row)
    }

    pub(crate) fn query(&self, query: &Query) -> Vec<Row> {
        select(&self.rows, query)
    }
}

/// Applies filters, ordering and paging to rows held in id order.
pub(crate) fn select(rows: &[Row], query: &Query) -> Vec<Row> {
    let mut matched: Vec<&Row> = rows.iter().filter(|row| query.filters.matches(&row.data)).collect();

    if let Some(order) = &query.order {
        matched.sort_by(|a, b| {
            let ord = match (a.data.get(&order.field), b.data.get(&order.field)) {
                (Some(x), Some(y)) if order.descending => compare_values(x, y).reverse(),
                (Some(x), Some(y)) => compare_values(x, y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            ord.then(a.id.cmp(&b.id))
        });
    }

    matched
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Orders values of the same kind. Mixed kinds compare equal.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
