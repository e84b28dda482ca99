//! Harvest command: runs every selected extractor concurrently into the store.

use crate::config::Config;
use crate::format::Formatter;
use crate::narrative::enrich::HttpEnricher;
use crate::narrative::NarrativeExtractor;
use crate::pipeline::{ItemPipeline, ItemRouter, PipelineContext, PipelineStats};
use crate::sources::catalog::Politeness;
use crate::sources::{HarvestReport, HttpFetcher, PageFetcher, SourceExtractor, SourceId, SourceProfile};
use crate::store::{SqliteStore, Store};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Per-producer outcome of a harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestSummary {
    pub source: String,
    pub live: usize,
    pub synthetic: usize,
    pub dropped: usize,
    pub blocked: usize,
    pub failed: usize,
    pub stored: usize,
    pub rejected: usize,
}

impl HarvestSummary {
    fn from_source(report: &HarvestReport, stats: PipelineStats) -> Self {
        Self {
            source: report.source.label().to_string(),
            live: report.live,
            synthetic: report.synthetic,
            dropped: report.dropped(),
            blocked: report.blocked(),
            failed: report.failed() + stats.failed,
            stored: stats.stored(),
            rejected: stats.rejected,
        }
    }
}

/// One extractor and the fetcher it uses.
pub struct HarvestJob {
    pub profile: SourceProfile,
    pub fetcher: Arc<dyn PageFetcher>,
}

/// Executes a harvest run.
pub struct HarvestCommand {
    config: Config,
}

impl HarvestCommand {
    /// Creates a new harvest command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Harvests the given sources (all enabled ones when empty) into the SQLite store.
    pub async fn execute(&self, sources: &[SourceId], narratives: bool) -> Result<String> {
        let store_dir = self.config.store_path();
        let store = SqliteStore::open(&store_dir)
            .await
            .with_context(|| format!("Failed to open store at {}", store_dir.display()))?;

        let selected = if sources.is_empty() { &self.config.enabled_sources[..] } else { sources };

        let mut jobs = Vec::new();
        for id in selected {
            let profile = self.config.profile(*id);
            let fetcher = HttpFetcher::new(&self.config, &profile.politeness)
                .with_context(|| format!("Failed to create HTTP client for {}", id))?;
            jobs.push(HarvestJob { profile, fetcher: Arc::new(fetcher) });
        }

        let narrative_fetcher: Option<Arc<dyn PageFetcher>> = if narratives {
            let fetcher = HttpFetcher::new(&self.config, &Politeness::default())
                .context("Failed to create HTTP client for narratives")?;
            Some(Arc::new(fetcher))
        } else {
            None
        };

        self.execute_with_fetchers(Arc::new(store), jobs, narrative_fetcher).await
    }

    /// Runs the jobs against a provided store and fetchers (for testing).
    pub async fn execute_with_fetchers(
        &self,
        store: Arc<dyn Store>,
        jobs: Vec<HarvestJob>,
        narrative_fetcher: Option<Arc<dyn PageFetcher>>,
    ) -> Result<String> {
        let summaries = self.run(store, jobs, narrative_fetcher).await?;
        Ok(Formatter::new(self.config.format).format_harvest(&summaries))
    }

    /// Runs the jobs concurrently and returns one summary per producer.
    pub async fn run(
        &self,
        store: Arc<dyn Store>,
        jobs: Vec<HarvestJob>,
        narrative_fetcher: Option<Arc<dyn PageFetcher>>,
    ) -> Result<Vec<HarvestSummary>> {
        let mut router = ItemRouter::new(store);
        if let Some(endpoint) = &self.config.enrichment_url {
            let enricher =
                HttpEnricher::new(&self.config, endpoint).context("Failed to create enrichment client")?;
            router = router.with_enricher(Arc::new(enricher));
        }

        let mut tasks = JoinSet::new();

        for (order, job) in jobs.into_iter().enumerate() {
            let id = job.profile.id;
            let extractor = SourceExtractor::new(job.profile)
                .with_context(|| format!("Invalid extraction rules for {}", id))?;
            let router = router.clone();
            let fetcher = job.fetcher;

            tasks.spawn(async move {
                let context = PipelineContext::new(id.id());
                let mut pipeline = ItemPipeline::open(router, &context);
                let report = extractor.harvest(fetcher.as_ref(), &mut pipeline).await;
                let stats = pipeline.close(&context);
                (order, HarvestSummary::from_source(&report, stats))
            });
        }

        if let Some(fetcher) = narrative_fetcher {
            let extractor = NarrativeExtractor::new(self.config.narrative_targets.clone());
            let router = router.clone();
            let order = usize::MAX;

            tasks.spawn(async move {
                let context = PipelineContext::new("narratives");
                let mut pipeline = ItemPipeline::open(router, &context);
                let report = extractor.harvest(fetcher.as_ref(), &mut pipeline).await;
                let stats = pipeline.close(&context);
                let summary = HarvestSummary {
                    source: "narratives".to_string(),
                    live: report.stories,
                    failed: report.skipped + stats.failed,
                    stored: stats.stored(),
                    rejected: stats.rejected,
                    ..HarvestSummary::default()
                };
                (order, summary)
            });
        }

        let mut summaries = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => {
                    debug!("{} finished", entry.1.source);
                    summaries.push(entry);
                }
                Err(e) => warn!("Extractor task failed: {}", e),
            }
        }
        summaries.sort_by_key(|(order, _)| *order);

        let summaries: Vec<HarvestSummary> = summaries.into_iter().map(|(_, s)| s).collect();
        info!(
            "Harvest finished: {} records stored from {} producers",
            summaries.iter().map(|s| s.stored).sum::<usize>(),
            summaries.len()
        );
        Ok(summaries)
    }
}
