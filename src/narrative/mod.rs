//! Narrative story extraction.
//!
//! Stories come from reference pages: record tables and career paragraphs on
//! encyclopedia pages, statistic panels on competition pages, and generic
//! article blocks everywhere else. Every story goes through [`build_story`],
//! which fills in summary, importance and search terms.

pub mod enrich;

use crate::pipeline::record::{RawRecord, RecordKind, StoryType};
use crate::sources::blocking::{BlockingDetector, Verdict};
use crate::sources::catalog::RetryPolicy;
use crate::sources::client::{fetch_with_retry, PageFetcher};
use crate::sources::extractor::RecordSink;
use crate::sources::heuristics::extract_year;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

const SUMMARY_CHARS: usize = 150;
const TITLE_CHARS: usize = 80;
const MAX_ARTICLES: usize = 10;
const MAX_CAREER_PARAGRAPHS: usize = 3;

const ERA_KEYWORDS: &[(&str, &[&str])] = &[
    ("Sporting", &["sporting", "lisbon", "primeira"]),
    ("United", &["manchester united", "old trafford", "ferguson"]),
    ("Madrid", &["real madrid", "bernabeu", "la liga", "galactico"]),
    ("Juventus", &["juventus", "turin", "serie a", "juve"]),
    ("Portugal", &["portugal", "selecao", "euro", "world cup"]),
    ("Al-Nassr", &["al-nassr", "saudi", "riyadh"]),
];

const RECORD_TABLE_TERMS: &[&str] = &["record", "achievement", "milestone", "goal"];
const MOMENT_TERMS: &[&str] = &["first", "debut", "record", "won", "scored", "signed"];

static ARTICLES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article, .story, .news-item").unwrap());
static HEADLINE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1, h2, h3").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());
static WIKITABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table.wikitable").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static SECTION_HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2, h3").unwrap());
static STAT_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".player-stats__item").unwrap());
static STAT_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".player-stats__label").unwrap());
static STAT_VALUE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".player-stats__value").unwrap());

/// A page to mine for stories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeTarget {
    pub url: String,
    /// Story type for generic articles on this page.
    #[serde(default = "default_story_type")]
    pub story_type: StoryType,
    /// Era every story on this page belongs to, when known.
    #[serde(default)]
    pub era: Option<String>,
}

fn default_story_type() -> StoryType {
    StoryType::General
}

impl NarrativeTarget {
    pub fn new(url: &str, story_type: StoryType, era: Option<&str>) -> Self {
        Self { url: url.to_string(), story_type, era: era.map(str::to_string) }
    }
}

/// Default pages mined for stories.
pub fn default_targets() -> Vec<NarrativeTarget> {
    vec![
        NarrativeTarget::new("https://en.wikipedia.org/wiki/Cristiano_Ronaldo", StoryType::General, None),
        NarrativeTarget::new(
            "https://en.wikipedia.org/wiki/Cristiano_Ronaldo_career_statistics",
            StoryType::Record,
            None,
        ),
        NarrativeTarget::new(
            "https://en.wikipedia.org/wiki/List_of_career_achievements_by_Cristiano_Ronaldo",
            StoryType::Milestone,
            None,
        ),
        NarrativeTarget::new(
            "https://www.uefa.com/uefachampionsleague/history/players/63706--cristiano-ronaldo/",
            StoryType::Milestone,
            None,
        ),
        NarrativeTarget::new(
            "https://www.premierleague.com/players/2522/Cristiano-Ronaldo/overview",
            StoryType::General,
            Some("United"),
        ),
        NarrativeTarget::new(
            "https://www.realmadrid.com/en/news/2018/07/official-announcement-cristiano-ronaldo",
            StoryType::General,
            Some("Madrid"),
        ),
    ]
}

/// Story fields before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct StoryDraft {
    pub title: String,
    pub content: String,
    pub story_type: Option<StoryType>,
    pub era: Option<String>,
    pub team: Option<String>,
    pub year: Option<String>,
    pub category_relevance: Option<String>,
    pub media_url: Option<String>,
    pub source_url: Option<String>,
    pub importance: Option<u8>,
}

/// Builds a narrative record, deriving summary, importance and search terms.
pub fn build_story(draft: StoryDraft) -> RawRecord {
    let story_type = draft.story_type.unwrap_or(StoryType::Trivia);
    let importance = draft.importance.unwrap_or_else(|| story_type.importance());

    let terms: Vec<&str> = [&draft.era, &draft.team, &draft.year]
        .into_iter()
        .filter_map(|term| term.as_deref())
        .collect();

    let mut record = RawRecord::new(RecordKind::Narrative)
        .with("title_en", draft.title.trim())
        .with("content_en", draft.content.trim())
        .with("summary_en", summarize(draft.content.trim()))
        .with("story_type", story_type.as_str())
        .with("importance_score", importance)
        .with("related_search_terms", terms.join(","));
    record.set_opt("era", draft.era.as_deref());
    record.set_opt("team", draft.team.as_deref());
    record.set_opt("year", draft.year.as_deref());
    record.set_opt("category_relevance", draft.category_relevance.as_deref());
    record.set_opt("media_url", draft.media_url.as_deref());
    record.set_opt("source_url", draft.source_url.as_deref());
    record
}

fn summarize(content: &str) -> String {
    if content.chars().count() > SUMMARY_CHARS {
        format!("{}...", content.chars().take(SUMMARY_CHARS).collect::<String>())
    } else {
        content.to_string()
    }
}

/// Era named by the first matching keyword group.
pub fn detect_era(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    ERA_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(era, _)| *era)
}

/// First sentence of a paragraph, capped at 80 characters.
pub fn title_from_text(text: &str) -> String {
    let first = text.split('.').next().unwrap_or_default().trim();
    if first.chars().count() > TITLE_CHARS {
        format!("{}...", first.chars().take(TITLE_CHARS - 3).collect::<String>())
    } else {
        first.to_string()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stories from `article`, `.story` and `.news-item` blocks.
pub fn parse_articles(document: &Html, target: &NarrativeTarget, page_url: &str) -> Vec<RawRecord> {
    document
        .select(&ARTICLES)
        .take(MAX_ARTICLES)
        .filter_map(|article| {
            let title = article.select(&HEADLINE).map(element_text).find(|t| !t.is_empty())?;
            let content = article
                .select(&PARAGRAPH)
                .map(element_text)
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if content.is_empty() {
                return None;
            }

            let media_url = article
                .select(&IMAGE)
                .next()
                .and_then(|img| img.value().attr("src"))
                .and_then(|src| join_url(page_url, src));

            Some(build_story(StoryDraft {
                title,
                content,
                story_type: Some(target.story_type),
                era: target.era.clone(),
                media_url,
                source_url: Some(page_url.to_string()),
                ..StoryDraft::default()
            }))
        })
        .collect()
}

/// Record stories from wiki tables whose headers mention records or goals.
pub fn parse_record_tables(document: &Html, page_url: &str) -> Vec<RawRecord> {
    let mut stories = Vec::new();
    for table in document.select(&WIKITABLE) {
        let headers = table.select(&TH).map(element_text).collect::<Vec<_>>().join(" ").to_lowercase();
        if !RECORD_TABLE_TERMS.iter().any(|term| headers.contains(term)) {
            continue;
        }

        for row in table.select(&TR).skip(1) {
            let cells: Vec<ElementRef<'_>> = row.select(&TD).collect();
            if cells.len() < 2 {
                continue;
            }
            let title = element_text(cells[0]);
            let content = element_text(cells[1]);
            if title.is_empty() || content.is_empty() {
                continue;
            }

            stories.push(build_story(StoryDraft {
                title,
                content,
                story_type: Some(StoryType::Record),
                source_url: Some(page_url.to_string()),
                ..StoryDraft::default()
            }));
        }
    }
    stories
}

/// Milestone stories from the first paragraphs after "Career" headings.
pub fn parse_career_moments(document: &Html, page_url: &str) -> Vec<RawRecord> {
    let mut stories = Vec::new();
    for heading in document.select(&SECTION_HEADING) {
        if !element_text(heading).to_lowercase().contains("career") {
            continue;
        }

        // Newer wiki markup wraps headings in a div; paragraphs follow the wrapper.
        let anchor = match heading.parent().and_then(ElementRef::wrap) {
            Some(parent) if parent.value().classes().any(|c| c == "mw-heading") => parent,
            _ => heading,
        };

        let paragraphs = anchor
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take_while(|sibling| !is_heading(*sibling))
            .filter(|sibling| sibling.value().name() == "p")
            .take(MAX_CAREER_PARAGRAPHS);

        for paragraph in paragraphs {
            let text = element_text(paragraph);
            let lower = text.to_lowercase();
            if !MOMENT_TERMS.iter().any(|term| lower.contains(term)) {
                continue;
            }

            stories.push(build_story(StoryDraft {
                title: title_from_text(&text),
                story_type: Some(StoryType::Milestone),
                era: detect_era(&text).map(str::to_string),
                year: extract_year(&text),
                source_url: Some(page_url.to_string()),
                content: text,
                ..StoryDraft::default()
            }));
        }
    }
    stories
}

fn is_heading(element: ElementRef<'_>) -> bool {
    matches!(element.value().name(), "h1" | "h2" | "h3")
        || element.value().classes().any(|c| c == "mw-heading")
}

/// Record stories from competition statistic panels.
pub fn parse_stat_panels(document: &Html, page_url: &str) -> Vec<RawRecord> {
    document
        .select(&STAT_ITEM)
        .filter_map(|item| {
            let label = item.select(&STAT_LABEL).map(element_text).next().filter(|s| !s.is_empty())?;
            let value = item.select(&STAT_VALUE).map(element_text).next().filter(|s| !s.is_empty())?;
            Some(build_story(StoryDraft {
                title: format!("Champions League {}: {}", label, value),
                content: format!(
                    "Cristiano Ronaldo has achieved {} {} in the UEFA Champions League, showcasing his dominance in Europe's premier competition.",
                    value, label
                ),
                story_type: Some(StoryType::Record),
                category_relevance: Some("jerseys,memorabilia".to_string()),
                source_url: Some(page_url.to_string()),
                ..StoryDraft::default()
            }))
        })
        .collect()
}

/// Parses a page with the strategy matching its host.
pub fn parse_target(html: &str, target: &NarrativeTarget, page_url: &str) -> Vec<RawRecord> {
    let document = Html::parse_document(html);
    let host = Url::parse(page_url).ok().and_then(|u| u.host_str().map(str::to_string)).unwrap_or_default();

    if host.ends_with("wikipedia.org") {
        let mut stories = parse_record_tables(&document, page_url);
        stories.extend(parse_career_moments(&document, page_url));
        stories
    } else if host.ends_with("uefa.com") {
        parse_stat_panels(&document, page_url)
    } else {
        parse_articles(&document, target, page_url)
    }
}

fn join_url(base: &str, href: &str) -> Option<String> {
    Url::parse(base).ok()?.join(href.trim()).ok().map(String::from)
}

/// Outcome of a narrative harvest.
#[derive(Debug, Clone, Default)]
pub struct NarrativeReport {
    pub pages: usize,
    pub skipped: usize,
    pub stories: usize,
}

/// Fetches narrative pages and emits stories.
pub struct NarrativeExtractor {
    targets: Vec<NarrativeTarget>,
    retry: RetryPolicy,
    detector: BlockingDetector,
}

impl NarrativeExtractor {
    pub fn new(targets: Vec<NarrativeTarget>) -> Self {
        Self { targets, retry: RetryPolicy::default(), detector: BlockingDetector::new() }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn targets(&self) -> &[NarrativeTarget] {
        &self.targets
    }

    /// Harvests every target. Blocked or failed pages are skipped.
    pub async fn harvest(&self, fetcher: &dyn PageFetcher, sink: &mut dyn RecordSink) -> NarrativeReport {
        let mut report = NarrativeReport::default();

        for target in &self.targets {
            let page = match fetch_with_retry(fetcher, &target.url, &self.retry).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("narratives: {}", e);
                    report.skipped += 1;
                    continue;
                }
            };

            if let Verdict::Blocked(reason) = self.detector.classify_page(&page) {
                warn!("narratives: blocked on {} ({})", target.url, reason);
                report.skipped += 1;
                continue;
            }

            let stories = parse_target(&page.body, target, &page.url);
            debug!("narratives: {} stories from {}", stories.len(), page.url);
            report.pages += 1;
            report.stories += stories.len();
            for story in stories {
                sink.accept(story).await;
            }
        }

        info!("narratives: {} stories from {} pages ({} skipped)", report.stories, report.pages, report.skipped);
        report
    }
}
