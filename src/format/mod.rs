//! Output formatting for listings, stories and run summaries (table, JSON, markdown, CSV).

use crate::commands::harvest::HarvestSummary;
use crate::commands::sources::SourceInfo;
use crate::config::OutputFormat;
use crate::pipeline::record::{CanonicalListing, LegacyListing, NarrativeRecord};
use serde::Serialize;

/// Formats query results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats listings in the given order.
    pub fn format_listings(&self, listings: &[CanonicalListing]) -> String {
        if listings.is_empty() {
            return self.empty(LISTING_CSV_HEADER, "No listings found.");
        }

        match self.format {
            OutputFormat::Json => json(listings),
            OutputFormat::Table => self.table_listings(listings),
            OutputFormat::Markdown => self.markdown_listings(listings),
            OutputFormat::Csv => self.csv_listings(listings),
        }
    }

    /// Formats legacy listings.
    pub fn format_legacy(&self, listings: &[LegacyListing]) -> String {
        if listings.is_empty() {
            return self.empty(LEGACY_CSV_HEADER, "No legacy listings found.");
        }

        match self.format {
            OutputFormat::Json => json(listings),
            OutputFormat::Table => self.table_legacy(listings),
            OutputFormat::Markdown => self.markdown_legacy(listings),
            OutputFormat::Csv => self.csv_legacy(listings),
        }
    }

    /// Formats narrative stories.
    pub fn format_stories(&self, stories: &[NarrativeRecord]) -> String {
        if stories.is_empty() {
            return self.empty(STORY_CSV_HEADER, "No stories found.");
        }

        match self.format {
            OutputFormat::Json => json(stories),
            OutputFormat::Table => self.table_stories(stories),
            OutputFormat::Markdown => self.markdown_stories(stories),
            OutputFormat::Csv => self.csv_stories(stories),
        }
    }

    /// Formats the per-source summary of a harvest run.
    pub fn format_harvest(&self, summaries: &[HarvestSummary]) -> String {
        if summaries.is_empty() {
            return self.empty(HARVEST_CSV_HEADER, "Nothing harvested.");
        }

        match self.format {
            OutputFormat::Json => json(summaries),
            OutputFormat::Table => self.table_harvest(summaries),
            OutputFormat::Markdown => self.markdown_harvest(summaries),
            OutputFormat::Csv => {
                let mut lines = vec![HARVEST_CSV_HEADER.to_string()];
                for s in summaries {
                    lines.push(format!(
                        "{},{},{},{},{},{},{},{}",
                        csv_escape(&s.source),
                        s.live,
                        s.synthetic,
                        s.dropped,
                        s.blocked,
                        s.failed,
                        s.stored,
                        s.rejected
                    ));
                }
                lines.join("\n")
            }
        }
    }

    /// Formats the source catalog.
    pub fn format_sources(&self, sources: &[SourceInfo]) -> String {
        match self.format {
            OutputFormat::Json => json(sources),
            OutputFormat::Csv => {
                let mut lines = vec!["id,label,kind,currency,targets,base_url".to_string()];
                for s in sources {
                    lines.push(format!(
                        "{},{},{},{},{},{}",
                        s.id,
                        csv_escape(&s.label),
                        s.kind,
                        s.currency,
                        s.targets,
                        s.base_url
                    ));
                }
                lines.join("\n")
            }
            OutputFormat::Markdown => {
                let mut lines = vec![
                    "| Id | Source | Kind | Currency | Targets | Base URL |".to_string(),
                    "|----|--------|------|----------|---------|----------|".to_string(),
                ];
                for s in sources {
                    lines.push(format!(
                        "| {} | {} | {} | {} | {} | {} |",
                        s.id, s.label, s.kind, s.currency, s.targets, s.base_url
                    ));
                }
                lines.join("\n")
            }
            OutputFormat::Table => {
                let mut lines = vec![
                    format!(
                        "{:<12}  {:<12}  {:<9}  {:<8}  {:>7}  {}",
                        "Id", "Source", "Kind", "Currency", "Targets", "Base URL"
                    ),
                    format!("{:-<12}  {:-<12}  {:-<9}  {:-<8}  {:-<7}  {:-<30}", "", "", "", "", "", ""),
                ];
                for s in sources {
                    lines.push(format!(
                        "{:<12}  {:<12}  {:<9}  {:<8}  {:>7}  {}",
                        s.id, s.label, s.kind, s.currency, s.targets, s.base_url
                    ));
                }
                lines.join("\n")
            }
        }
    }

    fn empty(&self, csv_header: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => "[]".to_string(),
            OutputFormat::Csv => csv_header.to_string(),
            _ => message.to_string(),
        }
    }

    // Table formatting

    fn table_listings(&self, listings: &[CanonicalListing]) -> String {
        let source_width = 11;
        let price_width = 10;
        let era_width = 8;
        let category_width = 12;
        let title_width = 50;

        let mut lines = Vec::new();

        lines.push(format!(
            "{:<source_width$}  {:<price_width$}  {:<era_width$}  {:<category_width$}  {}",
            "Source", "Price", "Era", "Category", "Title"
        ));
        lines.push(format!(
            "{:-<source_width$}  {:-<price_width$}  {:-<era_width$}  {:-<category_width$}  {:-<title_width$}",
            "", "", "", "", ""
        ));

        for listing in listings {
            let title = if listing.synthetic {
                format!("{} [demo]", listing.title_en)
            } else {
                listing.title_en.clone()
            };

            lines.push(format!(
                "{:<source_width$}  {:>price_width$.2}  {:<era_width$}  {:<category_width$}  {}",
                listing.source.label(),
                listing.price,
                truncate(listing.era.as_deref().unwrap_or("-"), era_width),
                truncate(listing.category.as_deref().unwrap_or("-"), category_width),
                truncate(&title, title_width)
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} listings", listings.len()));

        lines.join("\n")
    }

    fn table_legacy(&self, listings: &[LegacyListing]) -> String {
        let source_width = 11;
        let price_width = 10;
        let series_width = 8;
        let title_width = 50;

        let mut lines = Vec::new();

        lines.push(format!(
            "{:<source_width$}  {:<price_width$}  {:<series_width$}  {}",
            "Source", "Price", "Series", "Title"
        ));
        lines.push(format!(
            "{:-<source_width$}  {:-<price_width$}  {:-<series_width$}  {:-<title_width$}",
            "", "", "", ""
        ));

        for listing in listings {
            lines.push(format!(
                "{:<source_width$}  {:>price_width$.2}  {:<series_width$}  {}",
                listing.source.label(),
                listing.price,
                truncate(listing.series.as_deref().unwrap_or("-"), series_width),
                truncate(&listing.title_en, title_width)
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} legacy listings", listings.len()));

        lines.join("\n")
    }

    fn table_stories(&self, stories: &[NarrativeRecord]) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{:<4}  {:<10}  {:<10}  {}", "Imp", "Type", "Era", "Title"));
        lines.push(format!("{:-<4}  {:-<10}  {:-<10}  {:-<50}", "", "", "", ""));

        for story in stories {
            lines.push(format!(
                "{:>4}  {:<10}  {:<10}  {}",
                story.importance_score,
                story.story_type.as_str(),
                truncate(story.era.as_deref().unwrap_or("-"), 10),
                truncate(&story.title_en, 50)
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} stories", stories.len()));

        lines.join("\n")
    }

    fn table_harvest(&self, summaries: &[HarvestSummary]) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{:<12}  {:>6}  {:>9}  {:>7}  {:>7}  {:>6}  {:>6}  {:>8}",
            "Source", "Live", "Synthetic", "Dropped", "Blocked", "Failed", "Stored", "Rejected"
        ));
        lines.push(format!(
            "{:-<12}  {:-<6}  {:-<9}  {:-<7}  {:-<7}  {:-<6}  {:-<6}  {:-<8}",
            "", "", "", "", "", "", "", ""
        ));

        for s in summaries {
            lines.push(format!(
                "{:<12}  {:>6}  {:>9}  {:>7}  {:>7}  {:>6}  {:>6}  {:>8}",
                s.source, s.live, s.synthetic, s.dropped, s.blocked, s.failed, s.stored, s.rejected
            ));
        }

        let stored: usize = summaries.iter().map(|s| s.stored).sum();
        lines.push(String::new());
        lines.push(format!("Total: {} records stored", stored));

        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_listings(&self, listings: &[CanonicalListing]) -> String {
        let mut lines = Vec::new();

        lines.push("| Source | Price | Era | Category | Title |".to_string());
        lines.push("|--------|-------|-----|----------|-------|".to_string());

        for listing in listings {
            lines.push(format!(
                "| {} | {:.2} | {} | {} | [{}]({}) |",
                listing.source.label(),
                listing.price,
                listing.era.as_deref().unwrap_or(""),
                listing.category.as_deref().unwrap_or(""),
                truncate(&listing.title_en, 40),
                listing.item_url
            ));
        }

        lines.push(String::new());
        lines.push(format!("*{} listings found*", listings.len()));

        lines.join("\n")
    }

    fn markdown_legacy(&self, listings: &[LegacyListing]) -> String {
        let mut lines = Vec::new();

        lines.push("| Source | Price | Series | Title |".to_string());
        lines.push("|--------|-------|--------|-------|".to_string());

        for listing in listings {
            lines.push(format!(
                "| {} | {:.2} | {} | [{}]({}) |",
                listing.source.label(),
                listing.price,
                listing.series.as_deref().unwrap_or(""),
                truncate(&listing.title_en, 40),
                listing.legacy_url
            ));
        }

        lines.push(String::new());
        lines.push(format!("*{} legacy listings found*", listings.len()));

        lines.join("\n")
    }

    fn markdown_stories(&self, stories: &[NarrativeRecord]) -> String {
        let mut lines = Vec::new();

        for story in stories {
            lines.push(format!("## {}", story.title_en));
            lines.push(String::new());
            lines.push(format!(
                "- **Type:** {} (importance {})",
                story.story_type, story.importance_score
            ));
            if let Some(era) = &story.era {
                lines.push(format!("- **Era:** {}", era));
            }
            if let Some(url) = &story.source_url {
                lines.push(format!("- **Source:** [link]({})", url));
            }
            if !story.summary_en.is_empty() {
                lines.push(String::new());
                lines.push(story.summary_en.clone());
            }
            lines.push(String::new());
        }

        lines.push(format!("*{} stories found*", stories.len()));

        lines.join("\n")
    }

    fn markdown_harvest(&self, summaries: &[HarvestSummary]) -> String {
        let mut lines = Vec::new();

        lines.push("| Source | Live | Synthetic | Dropped | Blocked | Failed | Stored | Rejected |".to_string());
        lines.push("|--------|------|-----------|---------|---------|--------|--------|----------|".to_string());

        for s in summaries {
            lines.push(format!(
                "| {} | {} | {} | {} | {} | {} | {} | {} |",
                s.source, s.live, s.synthetic, s.dropped, s.blocked, s.failed, s.stored, s.rejected
            ));
        }

        lines.join("\n")
    }

    // CSV formatting

    fn csv_listings(&self, listings: &[CanonicalListing]) -> String {
        let mut lines = Vec::new();
        lines.push(LISTING_CSV_HEADER.to_string());

        for listing in listings {
            lines.push(format!(
                "{},{},{},{},{},{},{},{},{},{}",
                csv_escape(listing.source.label()),
                csv_escape(&listing.title_en),
                listing.price,
                csv_escape(listing.era.as_deref().unwrap_or("")),
                csv_escape(listing.category.as_deref().unwrap_or("")),
                csv_escape(listing.team.as_deref().unwrap_or("")),
                csv_escape(listing.condition.as_deref().unwrap_or("")),
                listing.synthetic,
                listing.item_url,
                listing.img_url.as_deref().unwrap_or("")
            ));
        }

        lines.join("\n")
    }

    fn csv_legacy(&self, listings: &[LegacyListing]) -> String {
        let mut lines = Vec::new();
        lines.push(LEGACY_CSV_HEADER.to_string());

        for listing in listings {
            lines.push(format!(
                "{},{},{},{},{},{}",
                csv_escape(listing.source.label()),
                csv_escape(&listing.title_en),
                listing.price,
                csv_escape(listing.series.as_deref().unwrap_or("")),
                listing.synthetic,
                listing.legacy_url
            ));
        }

        lines.join("\n")
    }

    fn csv_stories(&self, stories: &[NarrativeRecord]) -> String {
        let mut lines = Vec::new();
        lines.push(STORY_CSV_HEADER.to_string());

        for story in stories {
            lines.push(format!(
                "{},{},{},{},{},{}",
                csv_escape(&story.title_en),
                story.story_type,
                story.importance_score,
                csv_escape(story.era.as_deref().unwrap_or("")),
                csv_escape(&story.summary_en),
                story.source_url.as_deref().unwrap_or("")
            ));
        }

        lines.join("\n")
    }
}

const LISTING_CSV_HEADER: &str = "source,title,price,era,category,team,condition,synthetic,url,image";
const LEGACY_CSV_HEADER: &str = "source,title,price,series,synthetic,url";
const STORY_CSV_HEADER: &str = "title,story_type,importance,era,summary,source_url";
const HARVEST_CSV_HEADER: &str = "source,live,synthetic,dropped,blocked,failed,stored,rejected";

fn json<T: Serialize>(items: &[T]) -> String {
    serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string())
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Shortens text to `width` characters, ending in "..." when cut.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
