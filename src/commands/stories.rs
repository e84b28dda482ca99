//! Stories command: narratives ordered by importance.

use crate::commands::list::{decode_rows, open_store};
use crate::config::Config;
use crate::filters::FilterChainBuilder;
use crate::format::Formatter;
use crate::pipeline::record::NarrativeRecord;
use crate::store::{OrderBy, Query, Store, Table};
use anyhow::{Context, Result};
use tracing::info;

/// Query options for `stories`.
#[derive(Debug, Clone, Default)]
pub struct StoriesOptions {
    pub era: Option<String>,
    pub team: Option<String>,
    pub limit: Option<usize>,
}

/// Lists stored narratives, most important first.
pub struct StoriesCommand {
    config: Config,
}

impl StoriesCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn execute(&self, options: &StoriesOptions) -> Result<String> {
        let store = open_store(&self.config).await?;
        self.execute_with_store(&store, options).await
    }

    pub async fn execute_with_store(&self, store: &dyn Store, options: &StoriesOptions) -> Result<String> {
        let filters = FilterChainBuilder::new()
            .field("era", options.era.as_deref())
            .field("team", options.team.as_deref())
            .build();

        let mut query = Query::new().filters(filters).order_by(OrderBy::desc("importance_score"));
        if let Some(limit) = options.limit {
            query = query.limit(limit);
        }

        let rows = store.query(Table::Narratives, &query).await.context("Failed to query stories")?;
        let stories: Vec<NarrativeRecord> = decode_rows(rows);
        info!("Found {} stories", stories.len());

        Ok(Formatter::new(self.config.format).format_stories(&stories))
    }
}
