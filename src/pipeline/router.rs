//! Record classification, validation and persistence.
//!
//! The router is the only path from extractors into the store. Each extractor
//! task owns an [`ItemPipeline`] wrapping a router; the store is shared.

use crate::narrative::enrich::{EnrichRequest, Enricher};
use crate::pipeline::record::{
    to_document, CanonicalListing, LegacyListing, NarrativeRecord, RawRecord, RecordKind,
    ValidationError,
};
use crate::sources::extractor::RecordSink;
use crate::store::{Row, Store, StoreError, Table};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Errors surfaced by [`ItemRouter::route`].
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A persisted record.
#[derive(Debug, Clone)]
pub struct Routed {
    pub kind: RecordKind,
    pub table: Table,
    pub row: Row,
}

/// Classifies, validates and upserts records.
#[derive(Clone)]
pub struct ItemRouter {
    store: Arc<dyn Store>,
    enricher: Option<Arc<dyn Enricher>>,
}

impl ItemRouter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, enricher: None }
    }

    /// Enriches narratives before they are stored.
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Kind of a record. The producer's stamp wins over field inference.
    pub fn classify(record: &RawRecord) -> RecordKind {
        if let Some(kind) = record.kind {
            return kind;
        }
        if record.has("story_type") {
            RecordKind::Narrative
        } else if record.has("item_url") || record.has("era") || record.has("category") {
            RecordKind::Listing
        } else {
            RecordKind::Legacy
        }
    }

    /// Validates and persists one record.
    pub async fn route(&self, record: &RawRecord) -> Result<Routed, RouteError> {
        let kind = Self::classify(record);
        let now = Utc::now();

        let (table, document) = match kind {
            RecordKind::Listing => {
                let listing = CanonicalListing::from_record(record, now)?;
                (Table::Listings, to_document(&listing).map_err(StoreError::from)?)
            }
            RecordKind::Legacy => {
                let listing = LegacyListing::from_record(record, now)?;
                (Table::LegacyListings, to_document(&listing).map_err(StoreError::from)?)
            }
            RecordKind::Narrative => {
                let mut story = NarrativeRecord::from_record(record)?;
                self.enrich(&mut story).await;
                (Table::Narratives, to_document(&story).map_err(StoreError::from)?)
            }
        };

        let row = self.store.upsert(table, table.key_field(), document).await?;
        debug!("Upserted {} row {} into {}", kind, row.id, table);
        Ok(Routed { kind, table, row })
    }

    async fn enrich(&self, story: &mut NarrativeRecord) {
        let Some(enricher) = &self.enricher else {
            return;
        };

        let request = EnrichRequest {
            title: story.title_en.clone(),
            context: story.content_en.clone(),
            story_type: story.story_type.to_string(),
            era: story.era.clone(),
        };

        match enricher.enrich(&request).await {
            Ok(content) => {
                for (field, value) in content.fields() {
                    let value = value.to_string();
                    match field {
                        "content_en" => story.content_en = value,
                        "content_he" => story.content_he = Some(value),
                        "summary_en" => story.summary_en = value,
                        "summary_he" => story.summary_he = Some(value),
                        _ => {}
                    }
                }
            }
            Err(e) => warn!("Enrichment failed for \"{}\": {:#}", story.title_en, e),
        }
    }
}

/// Identifies a pipeline instance in logs.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub name: String,
}

impl PipelineContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Counters reported when a pipeline closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub processed: usize,
    pub listings: usize,
    pub legacy: usize,
    pub narratives: usize,
    pub rejected: usize,
    pub failed: usize,
    pub synthetic: usize,
}

impl PipelineStats {
    pub fn stored(&self) -> usize {
        self.listings + self.legacy + self.narratives
    }
}

/// Stream adapter around a router. Never fails: bad records are logged and counted.
pub struct ItemPipeline {
    router: ItemRouter,
    context: PipelineContext,
    stats: PipelineStats,
}

impl ItemPipeline {
    /// Opens a pipeline for one producer.
    pub fn open(router: ItemRouter, context: &PipelineContext) -> Self {
        debug!("Opening pipeline {}", context.name);
        Self { router, context: context.clone(), stats: PipelineStats::default() }
    }

    /// Routes a record and hands it back unchanged.
    pub async fn process(&mut self, record: RawRecord, context: &PipelineContext) -> RawRecord {
        self.stats.processed += 1;

        match self.router.route(&record).await {
            Ok(routed) => {
                match routed.kind {
                    RecordKind::Listing => self.stats.listings += 1,
                    RecordKind::Legacy => self.stats.legacy += 1,
                    RecordKind::Narrative => self.stats.narratives += 1,
                }
                if record.is_synthetic() {
                    self.stats.synthetic += 1;
                }
            }
            Err(RouteError::Validation(e)) => {
                warn!("{}: dropped record {}: {}", context.name, describe(&record), e);
                self.stats.rejected += 1;
            }
            Err(RouteError::Store(e)) => {
                warn!("{}: failed to store {}: {}", context.name, describe(&record), e);
                self.stats.failed += 1;
            }
        }

        record
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Closes the pipeline and returns its counters.
    pub fn close(self, context: &PipelineContext) -> PipelineStats {
        let stats = self.stats;
        info!(
            "{}: processed {} ({} listings, {} legacy, {} narratives, {} rejected, {} failed)",
            context.name,
            stats.processed,
            stats.listings,
            stats.legacy,
            stats.narratives,
            stats.rejected,
            stats.failed
        );
        stats
    }
}

#[async_trait]
impl RecordSink for ItemPipeline {
    async fn accept(&mut self, record: RawRecord) {
        let context = self.context.clone();
        self.process(record, &context).await;
    }
}

fn describe(record: &RawRecord) -> String {
    match record.fields.get("title_en") {
        Some(Value::String(title)) => format!("\"{}\"", title),
        _ => "<untitled>".to_string(),
    }
}
