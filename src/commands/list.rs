//! List and legacy commands: query stored listings.

use crate::config::Config;
use crate::filters::FilterChainBuilder;
use crate::format::Formatter;
use crate::interleave::interleave;
use crate::pipeline::record::{from_document, CanonicalListing, LegacyListing};
use crate::sources::SourceId;
use crate::store::{OrderBy, Query, Row, SqliteStore, Store, Table};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Query options for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub era: Option<String>,
    pub category: Option<String>,
    pub team: Option<String>,
    pub source: Option<SourceId>,
    /// Vehicle series; part sources store it in `era`.
    pub series: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub keywords: Vec<String>,
    pub exclude: Vec<String>,
    pub offset: usize,
    pub limit: Option<usize>,
    /// Keep recency order instead of interleaving sources.
    pub no_shuffle: bool,
}

/// Lists stored listings interleaved across sources.
pub struct ListCommand {
    config: Config,
}

impl ListCommand {
    /// Creates a new list command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Queries the SQLite store and returns formatted output.
    pub async fn execute(&self, options: &ListOptions) -> Result<String> {
        let store = open_store(&self.config).await?;
        self.execute_with_store(&store, options).await
    }

    /// Queries a provided store (for testing).
    pub async fn execute_with_store(&self, store: &dyn Store, options: &ListOptions) -> Result<String> {
        let listings = self.listings(store, options).await?;
        Ok(Formatter::new(self.config.format).format_listings(&listings))
    }

    /// Filtered listings, interleaved by source, then paged.
    pub async fn listings(&self, store: &dyn Store, options: &ListOptions) -> Result<Vec<CanonicalListing>> {
        let filters = FilterChainBuilder::new()
            .field("era", options.era.as_deref())
            .field("era", options.series.as_deref())
            .field("category", options.category.as_deref())
            .field("team", options.team.as_deref())
            .field("source", options.source.map(|s| s.label()))
            .price_range(options.min_price, options.max_price)
            .keywords(options.keywords.clone())
            .exclude_keywords(options.exclude.clone())
            .build();

        if !filters.is_empty() {
            debug!("Active filters: {}", filters.descriptions().join(", "));
        }

        let query = Query::new().filters(filters).order_by(OrderBy::desc("fetched_at"));
        let rows = store.query(Table::Listings, &query).await.context("Failed to query listings")?;
        let listings: Vec<CanonicalListing> = decode_rows(rows);

        let ordered = if options.no_shuffle {
            listings
        } else {
            let mut groups: BTreeMap<SourceId, Vec<CanonicalListing>> = BTreeMap::new();
            for listing in listings {
                groups.entry(listing.source).or_default().push(listing);
            }
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_rng(&mut rand::rng()),
            };
            interleave(groups.into_iter().collect(), &mut rng)
        };

        let page = paginate(ordered, options.offset, options.limit);
        info!("Found {} listings", page.len());
        Ok(page)
    }
}

/// Query options for `legacy`.
#[derive(Debug, Clone, Default)]
pub struct LegacyOptions {
    pub series: Option<String>,
    pub source: Option<SourceId>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Lists legacy listings.
pub struct LegacyCommand {
    config: Config,
}

impl LegacyCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn execute(&self, options: &LegacyOptions) -> Result<String> {
        let store = open_store(&self.config).await?;
        self.execute_with_store(&store, options).await
    }

    pub async fn execute_with_store(&self, store: &dyn Store, options: &LegacyOptions) -> Result<String> {
        let filters = FilterChainBuilder::new()
            .field("series", options.series.as_deref())
            .field("source", options.source.map(|s| s.label()))
            .build();

        let mut query = Query::new()
            .filters(filters)
            .order_by(OrderBy::desc("fetched_at"))
            .offset(options.offset);
        if let Some(limit) = options.limit {
            query = query.limit(limit);
        }

        let rows = store.query(Table::LegacyListings, &query).await.context("Failed to query legacy listings")?;
        let listings: Vec<LegacyListing> = decode_rows(rows);
        info!("Found {} legacy listings", listings.len());

        Ok(Formatter::new(self.config.format).format_legacy(&listings))
    }
}

pub(crate) async fn open_store(config: &Config) -> Result<SqliteStore> {
    let dir = config.store_path();
    SqliteStore::open(&dir).await.with_context(|| format!("Failed to open store at {}", dir.display()))
}

/// Decodes rows, skipping any that no longer match the current shape.
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match from_document(row.data) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping unreadable row {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

fn paginate<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let iter = items.into_iter().skip(offset);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}
