//! Known sources and their extraction profiles.
//!
//! Every per-source difference lives here as data: target URLs, selector
//! chains, currency, politeness and record shape. The extractor itself is
//! generic.

use crate::pipeline::record::RecordKind;
use crate::sources::heuristics::ConditionStyle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported listing sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceId {
    #[serde(rename = "eBay", alias = "ebay")]
    Ebay,
    #[serde(rename = "AliExpress", alias = "aliexpress")]
    AliExpress,
    #[serde(rename = "Schmiedmann", alias = "schmiedmann")]
    Schmiedmann,
    #[serde(rename = "Spareto", alias = "spareto")]
    Spareto,
    #[serde(rename = "FCP Euro", alias = "fcpeuro")]
    FcpEuro,
    #[serde(rename = "RockAuto", alias = "rockauto")]
    RockAuto,
}

impl SourceId {
    /// Returns all sources.
    pub fn all() -> &'static [SourceId] {
        &[
            SourceId::Ebay,
            SourceId::AliExpress,
            SourceId::Schmiedmann,
            SourceId::Spareto,
            SourceId::FcpEuro,
            SourceId::RockAuto,
        ]
    }

    /// Short lowercase identifier used on the command line and in config.
    pub fn id(&self) -> &'static str {
        match self {
            SourceId::Ebay => "ebay",
            SourceId::AliExpress => "aliexpress",
            SourceId::Schmiedmann => "schmiedmann",
            SourceId::Spareto => "spareto",
            SourceId::FcpEuro => "fcpeuro",
            SourceId::RockAuto => "rockauto",
        }
    }

    /// Display label persisted in the `source` field.
    pub fn label(&self) -> &'static str {
        match self {
            SourceId::Ebay => "eBay",
            SourceId::AliExpress => "AliExpress",
            SourceId::Schmiedmann => "Schmiedmann",
            SourceId::Spareto => "Spareto",
            SourceId::FcpEuro => "FCP Euro",
            SourceId::RockAuto => "RockAuto",
        }
    }

    /// Returns the base URL for this source.
    pub fn base_url(&self) -> &'static str {
        match self {
            SourceId::Ebay => "https://www.ebay.com",
            SourceId::AliExpress => "https://www.aliexpress.com",
            SourceId::Schmiedmann => "https://www.schmiedmann.com",
            SourceId::Spareto => "https://www.spareto.com",
            SourceId::FcpEuro => "https://www.fcpeuro.com",
            SourceId::RockAuto => "https://www.rockauto.com",
        }
    }

    /// Returns the extraction profile for this source.
    pub fn profile(&self) -> SourceProfile {
        match self {
            SourceId::Ebay => ebay(),
            SourceId::AliExpress => aliexpress(),
            SourceId::Schmiedmann => schmiedmann(),
            SourceId::Spareto => spareto(),
            SourceId::FcpEuro => fcpeuro(),
            SourceId::RockAuto => rockauto(),
        }
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SourceId::all()
            .iter()
            .find(|id| id.id() == wanted || id.label().to_lowercase() == wanted)
            .copied()
            .ok_or_else(|| {
                format!(
                    "Unknown source: {}. Use: {}",
                    s,
                    SourceId::all().iter().map(|id| id.id()).collect::<Vec<_>>().join(", ")
                )
            })
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// The query a target was issued for. Part sources carry the vehicle series in `era`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryContext {
    pub era: String,
    pub category: Option<String>,
}

impl QueryContext {
    pub fn new(era: impl Into<String>, category: Option<&str>) -> Self {
        Self { era: era.into(), category: category.map(str::to_string) }
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(category) => write!(f, "{}/{}", self.era, category),
            None => f.write_str(&self.era),
        }
    }
}

/// A start URL, relative to the profile base URL, and its query context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub path: String,
    pub context: QueryContext,
}

impl Target {
    pub fn new(path: impl Into<String>, context: QueryContext) -> Self {
        Self { path: path.into(), context }
    }

    /// Builds a search target with a URL-encoded query parameter.
    pub fn search(path: &str, param: &str, terms: &str, context: QueryContext) -> Self {
        let sep = if path.contains('?') { '&' } else { '?' };
        Self::new(format!("{}{}{}={}", path, sep, param, urlencoding::encode(terms)), context)
    }
}

/// Retry budget for transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_times: u32,
    pub backoff_ms: u64,
    pub statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retry_times: 2, backoff_ms: 1000, statuses: vec![500, 502, 503, 504, 408, 429] }
    }
}

/// Request pacing for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Politeness {
    pub delay_ms: u64,
    pub delay_jitter_ms: u64,
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl Politeness {
    fn paced(delay_ms: u64, delay_jitter_ms: u64) -> Self {
        Self { delay_ms, delay_jitter_ms, max_in_flight: 1, retry: RetryPolicy::default() }
    }
}

impl Default for Politeness {
    fn default() -> Self {
        Self::paced(2000, 3000)
    }
}

/// Per-field rule expressions, tried in order.
#[derive(Debug, Clone, Default)]
pub struct FieldRules {
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub link: Vec<String>,
    pub image: Vec<String>,
    pub next_page: Vec<String>,
}

/// Regex rewrite applied to image URLs (thumbnail to full size).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRewrite {
    pub pattern: String,
    pub replacement: String,
}

/// Which secondary attributes a source derives from titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristics {
    /// Team, year, size and condition from the title.
    Memorabilia(ConditionStyle),
    /// Part category from the title.
    Parts,
}

/// Description templates. Placeholders: `{title}`, `{era}`, `{category}`, `{source}`.
#[derive(Debug, Clone, Default)]
pub struct Descriptions {
    pub en: String,
    pub he: Option<String>,
}

/// Everything the generic extractor needs to harvest one source.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub id: SourceId,
    pub base_url: String,
    pub targets: Vec<Target>,
    pub containers: Vec<String>,
    pub fields: FieldRules,
    /// Accepted links must contain this fragment.
    pub link_must_contain: Option<String>,
    pub currency: &'static str,
    /// Fixed multiplier into USD.
    pub usd_rate: Option<f64>,
    pub politeness: Politeness,
    pub record_kind: RecordKind,
    pub heuristics: Heuristics,
    pub max_items_per_page: Option<usize>,
    pub max_pages: u32,
    /// Items whose title contains any of these are skipped.
    pub skip_titles: Vec<String>,
    /// Brand prefixed to titles that name neither brand nor series.
    pub title_brand: Option<String>,
    pub image_rewrites: Vec<ImageRewrite>,
    pub placeholder_image: Option<String>,
    pub extra_indicators: Vec<String>,
    pub descriptions: Descriptions,
    pub authenticity: Option<String>,
}

impl SourceProfile {
    /// Full URL of a target.
    pub fn target_url(&self, target: &Target) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), target.path)
    }

    /// Points the profile at a different origin (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the targets.
    pub fn with_targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }

    /// Groups targets by context, keeping first-seen order.
    pub fn contexts(&self) -> Vec<(QueryContext, Vec<&Target>)> {
        let mut grouped: Vec<(QueryContext, Vec<&Target>)> = Vec::new();
        for target in &self.targets {
            match grouped.iter_mut().find(|(ctx, _)| *ctx == target.context) {
                Some((_, targets)) => targets.push(target),
                None => grouped.push((target.context.clone(), vec![target])),
            }
        }
        grouped
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const COLLECTIBLE_DESCRIPTION_HE: &str = "פריט של כריסטיאנו רונאלדו מתקופת {era}. {title}";

fn ebay() -> SourceProfile {
    let searches: &[(&str, &str, &str)] = &[
        ("Sporting", "jerseys", "cristiano ronaldo sporting lisbon jersey"),
        ("United", "jerseys", "cristiano ronaldo manchester united jersey"),
        ("Madrid", "jerseys", "cristiano ronaldo real madrid jersey"),
        ("Juventus", "jerseys", "cristiano ronaldo juventus jersey"),
        ("Portugal", "jerseys", "cristiano ronaldo portugal jersey"),
        ("Al-Nassr", "jerseys", "cristiano ronaldo al nassr jersey"),
        ("General", "memorabilia", "cristiano ronaldo memorabilia"),
        ("General", "signed_items", "cristiano ronaldo signed"),
        ("General", "boots", "cristiano ronaldo boots shoes"),
        ("General", "cards", "cristiano ronaldo trading card"),
    ];

    SourceProfile {
        id: SourceId::Ebay,
        base_url: SourceId::Ebay.base_url().to_string(),
        targets: searches
            .iter()
            .map(|(era, category, terms)| {
                Target::search("/sch/i.html?_sacat=0", "_nkw", terms, QueryContext::new(*era, Some(*category)))
            })
            .collect(),
        containers: strings(&["ul.srp-results .s-item", ".s-item"]),
        fields: FieldRules {
            title: strings(&["div.s-item__title span::text", ".s-item__title::text"]),
            price: strings(&["span.s-item__price::text"]),
            link: strings(&["a.s-item__link::attr(href)"]),
            image: strings(&[
                "div.s-item__image-wrapper img::attr(data-defer-load)",
                "div.s-item__image-wrapper img::attr(src)",
            ]),
            next_page: strings(&["a.pagination__next::attr(href)"]),
        },
        link_must_contain: None,
        currency: "USD",
        usd_rate: None,
        politeness: Politeness::default(),
        record_kind: RecordKind::Listing,
        heuristics: Heuristics::Memorabilia(ConditionStyle::Collectible),
        max_items_per_page: None,
        max_pages: 1,
        skip_titles: strings(&["Sponsored"]),
        title_brand: None,
        image_rewrites: vec![ImageRewrite {
            pattern: "s-l64".to_string(),
            replacement: "s-l400".to_string(),
        }],
        placeholder_image: None,
        extra_indicators: Vec::new(),
        descriptions: Descriptions {
            en: "Cristiano Ronaldo {category} from {era} era. {title}".to_string(),
            he: Some(COLLECTIBLE_DESCRIPTION_HE.to_string()),
        },
        authenticity: None,
    }
}

fn aliexpress() -> SourceProfile {
    let searches: &[(&str, &str, &[&str])] = &[
        ("United", "jerseys", &["cristiano ronaldo manchester united jersey", "ronaldo united shirt"]),
        ("Madrid", "jerseys", &["cristiano ronaldo real madrid jersey", "ronaldo madrid shirt"]),
        ("Juventus", "jerseys", &["cristiano ronaldo juventus jersey", "ronaldo juventus shirt"]),
        ("Portugal", "jerseys", &["cristiano ronaldo portugal jersey", "ronaldo portugal shirt"]),
        ("Al-Nassr", "jerseys", &["cristiano ronaldo al nassr jersey", "ronaldo al nassr shirt"]),
        ("General", "memorabilia", &["cristiano ronaldo memorabilia", "ronaldo collectible"]),
        ("General", "boots", &["cristiano ronaldo boots", "ronaldo football shoes"]),
        ("General", "cards", &["cristiano ronaldo card", "ronaldo trading card"]),
    ];

    SourceProfile {
        id: SourceId::AliExpress,
        base_url: SourceId::AliExpress.base_url().to_string(),
        targets: searches
            .iter()
            .flat_map(|(era, category, terms)| {
                terms.iter().map(move |terms| {
                    Target::search("/wholesale", "SearchText", terms, QueryContext::new(*era, Some(*category)))
                })
            })
            .collect(),
        containers: strings(&[
            "div.list--gallery--34TrPt1 div.list-item",
            "div.search-item-card-wrapper",
            "div[data-spm-anchor-id]",
            "div.item",
        ]),
        fields: FieldRules {
            title: strings(&["h1::text", "h2::text", "h3::text", ".item-title::text", "a[title]::attr(title)", ".title::text"]),
            price: strings(&[".price-current::text", ".price::text", "[class*='price']::text", ".notranslate::text"]),
            link: strings(&["a::attr(href)", "a[href*='item']::attr(href)"]),
            image: strings(&["img::attr(src)", "img::attr(data-src)", "img::attr(data-lazy-src)"]),
            next_page: Vec::new(),
        },
        link_must_contain: Some("item".to_string()),
        currency: "USD",
        usd_rate: None,
        politeness: Politeness::paced(8000, 4000),
        record_kind: RecordKind::Listing,
        heuristics: Heuristics::Memorabilia(ConditionStyle::Marketplace),
        max_items_per_page: Some(10),
        max_pages: 1,
        skip_titles: Vec::new(),
        title_brand: None,
        image_rewrites: Vec::new(),
        placeholder_image: None,
        extra_indicators: strings(&["punish", "verification"]),
        descriptions: Descriptions {
            en: "Cristiano Ronaldo {category} from {era} era. {title}".to_string(),
            he: Some(COLLECTIBLE_DESCRIPTION_HE.to_string()),
        },
        authenticity: None,
    }
}

fn schmiedmann() -> SourceProfile {
    let sections = [
        "spare-parts-engine-and-driveline-mc12-catn-ol",
        "spare-parts-brakes-chassis-suspension-mc13-catn-ol",
        "spare-parts-lighting-heater-and-interior-mc14-catn-ol",
        "spare-parts-electronic-parts-mc15-catn-ol",
    ];
    let mut targets = Vec::new();
    for (series, slug) in [("E28", "bmw-E28"), ("F10", "bmw-f10")] {
        for section in sections {
            targets.push(Target::new(format!("/en/{}/{}", slug, section), QueryContext::new(series, None)));
        }
    }

    SourceProfile {
        id: SourceId::Schmiedmann,
        base_url: SourceId::Schmiedmann.base_url().to_string(),
        targets,
        containers: strings(&[
            ".product-inner",
            ".product-card",
            ".product-item",
            ".item-card",
            "[data-product-id]",
            ".spare-part-item",
            ".product-box",
            ".article-item",
            ".part-card",
            ".catalog-item",
            ".product-tile",
            "article.product",
            "li.product",
            ".product-list-item",
        ]),
        fields: FieldRules {
            title: strings(&[
                ".small-product-name::text",
                "h3.product-title::text",
                ".product-name::text",
                ".item-title::text",
                ".article-name::text",
                ".part-name::text",
                "h2::text",
                "h3::text",
                "h4::text",
                ".title::text",
                "a[title]::attr(title)",
                ".name::text",
            ]),
            price: strings(&[
                ".product-price::text",
                ".price-display::text",
                ".price::text",
                "[data-price]::attr(data-price)",
                ".price-value::text",
                ".item-price::text",
                ".current-price::text",
                ".sale-price::text",
                ".final-price::text",
                ".amount::text",
            ]),
            link: strings(&[
                "a::attr(href)",
                ".product-link::attr(href)",
                "[data-href]::attr(data-href)",
                "[data-url]::attr(data-url)",
            ]),
            image: strings(&[
                ".product-image img::attr(src)",
                "img::attr(src)",
                "img::attr(data-src)",
                "img::attr(data-lazy)",
                "img::attr(data-original)",
                "picture img::attr(src)",
            ]),
            next_page: strings(&[
                ".pagination .next::attr(href)",
                ".pagination-next::attr(href)",
                "a[rel='next']::attr(href)",
                ".next-page::attr(href)",
                ".pager-next::attr(href)",
                "a.next::attr(href)",
            ]),
        },
        link_must_contain: None,
        currency: "EUR",
        usd_rate: Some(1.08),
        politeness: Politeness::paced(8000, 4000),
        record_kind: RecordKind::Listing,
        heuristics: Heuristics::Parts,
        max_items_per_page: None,
        max_pages: 5,
        skip_titles: Vec::new(),
        title_brand: Some("BMW".to_string()),
        image_rewrites: Vec::new(),
        placeholder_image: Some(
            "https://via.placeholder.com/300x300/CCCCCC/666666?text=Schmiedmann+Part".to_string(),
        ),
        extra_indicators: Vec::new(),
        descriptions: Descriptions {
            en: "BMW {era} part from Schmiedmann: {title}".to_string(),
            he: Some("חלק BMW {era} מ-Schmiedmann: {title}".to_string()),
        },
        authenticity: None,
    }
}

fn spareto() -> SourceProfile {
    SourceProfile {
        id: SourceId::Spareto,
        base_url: SourceId::Spareto.base_url().to_string(),
        targets: ["E28", "F10"]
            .iter()
            .map(|series| {
                Target::search("/products", "keywords", &format!("BMW {}", series), QueryContext::new(*series, None))
            })
            .collect(),
        containers: strings(&[".card-product"]),
        fields: FieldRules {
            title: strings(&[".name::text"]),
            price: strings(&[".card-product-price::text"]),
            link: strings(&["a::attr(href)"]),
            image: strings(&[".card-product-image img::attr(src)"]),
            next_page: Vec::new(),
        },
        link_must_contain: None,
        currency: "USD",
        usd_rate: None,
        politeness: Politeness::default(),
        record_kind: RecordKind::Legacy,
        heuristics: Heuristics::Parts,
        max_items_per_page: None,
        max_pages: 1,
        skip_titles: Vec::new(),
        title_brand: None,
        image_rewrites: Vec::new(),
        placeholder_image: None,
        extra_indicators: Vec::new(),
        descriptions: Descriptions {
            en: "This is a placeholder description for {title}.".to_string(),
            he: Some("זוהי תיאור ממלא מקום עבור {title}.".to_string()),
        },
        authenticity: None,
    }
}

fn fcpeuro() -> SourceProfile {
    SourceProfile {
        id: SourceId::FcpEuro,
        base_url: SourceId::FcpEuro.base_url().to_string(),
        targets: ["E28", "F10"]
            .iter()
            .map(|series| {
                let terms = format!("bmw {} parts", series.to_lowercase());
                Target::search("/search", "q", &terms, QueryContext::new(*series, None))
            })
            .collect(),
        containers: strings(&[".product-grid-item"]),
        fields: FieldRules {
            title: strings(&[".product-title::text"]),
            price: strings(&[".price::text"]),
            link: strings(&["a::attr(href)"]),
            image: strings(&["img::attr(src)"]),
            next_page: Vec::new(),
        },
        link_must_contain: None,
        currency: "USD",
        usd_rate: None,
        politeness: Politeness::default(),
        record_kind: RecordKind::Legacy,
        heuristics: Heuristics::Parts,
        max_items_per_page: None,
        max_pages: 1,
        skip_titles: Vec::new(),
        title_brand: None,
        image_rewrites: Vec::new(),
        placeholder_image: None,
        extra_indicators: Vec::new(),
        descriptions: Descriptions {
            en: "This is a placeholder description for {title}.".to_string(),
            he: Some("זוהי תיאור ממלא מקום עבור {title}.".to_string()),
        },
        authenticity: None,
    }
}

fn rockauto() -> SourceProfile {
    SourceProfile {
        id: SourceId::RockAuto,
        base_url: SourceId::RockAuto.base_url().to_string(),
        targets: vec![
            Target::new("/en/mbmw,840313,e28/1987,parts/,5-series.html", QueryContext::new("E28", None)),
            Target::new(
                "/en/mbmw,1132906,f10-f11-f07/2010,parts/,5-series.html",
                QueryContext::new("F10", None),
            ),
        ],
        containers: strings(&["table.listing tbody tr", "table[cellspacing='1'] tbody tr"]),
        fields: FieldRules {
            title: strings(&[".listing-text-description::text", ".listing-text-strong::text"]),
            price: strings(&[".listing-price-num::text", ".price::text"]),
            link: strings(&["a.listing-text-description::attr(href)", "a::attr(href)"]),
            image: strings(&[".listing-img img::attr(src)"]),
            next_page: strings(&["a.pagination-link.next::attr(href)"]),
        },
        link_must_contain: None,
        currency: "USD",
        usd_rate: None,
        politeness: Politeness::paced(2000, 2000),
        record_kind: RecordKind::Listing,
        heuristics: Heuristics::Parts,
        max_items_per_page: None,
        max_pages: 3,
        skip_titles: Vec::new(),
        title_brand: None,
        image_rewrites: vec![ImageRewrite {
            pattern: r"(?i)_[sm]\.(jpg|jpeg|png|gif)".to_string(),
            replacement: "_l.$1".to_string(),
        }],
        placeholder_image: None,
        extra_indicators: Vec::new(),
        descriptions: Descriptions { en: "BMW {era} part from RockAuto".to_string(), he: None },
        authenticity: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::rules::{ContainerRules, RuleChain};

    #[test]
    fn test_source_parsing() {
        assert_eq!("ebay".parse::<SourceId>().unwrap(), SourceId::Ebay);
        assert_eq!("eBay".parse::<SourceId>().unwrap(), SourceId::Ebay);
        assert_eq!("FCP Euro".parse::<SourceId>().unwrap(), SourceId::FcpEuro);
        assert_eq!(" RockAuto ".parse::<SourceId>().unwrap(), SourceId::RockAuto);

        let err = "amazon".parse::<SourceId>().unwrap_err();
        assert!(err.contains("Unknown source"));
        assert!(err.contains("schmiedmann"));
    }

    #[test]
    fn test_source_serde_uses_labels() {
        assert_eq!(serde_json::to_string(&SourceId::FcpEuro).unwrap(), "\"FCP Euro\"");
        let parsed: SourceId = serde_json::from_str("\"aliexpress\"").unwrap();
        assert_eq!(parsed, SourceId::AliExpress);
        let parsed: SourceId = serde_json::from_str("\"AliExpress\"").unwrap();
        assert_eq!(parsed, SourceId::AliExpress);
    }

    #[test]
    fn test_display_is_id() {
        for id in SourceId::all() {
            assert_eq!(id.to_string(), id.id());
            assert_eq!(id.profile().id, *id);
        }
    }

    #[test]
    fn test_every_profile_compiles() {
        for id in SourceId::all() {
            let profile = id.profile();
            assert!(!profile.targets.is_empty(), "{} has no targets", id);
            ContainerRules::parse(&profile.containers).unwrap();
            for rules in [
                &profile.fields.title,
                &profile.fields.price,
                &profile.fields.link,
                &profile.fields.image,
                &profile.fields.next_page,
            ] {
                RuleChain::parse(rules).unwrap();
            }
            for rewrite in &profile.image_rewrites {
                regex_lite::Regex::new(&rewrite.pattern).unwrap();
            }
        }
    }

    #[test]
    fn test_search_target_encoding() {
        let profile = SourceId::Ebay.profile();
        let url = profile.target_url(&profile.targets[1]);
        assert_eq!(
            url,
            "https://www.ebay.com/sch/i.html?_sacat=0&_nkw=cristiano%20ronaldo%20manchester%20united%20jersey"
        );
        assert_eq!(profile.targets[1].context, QueryContext::new("United", Some("jerseys")));
    }

    #[test]
    fn test_contexts_group_targets() {
        let profile = SourceId::AliExpress.profile();
        let contexts = profile.contexts();
        assert_eq!(contexts.len(), 8);
        assert!(contexts.iter().all(|(_, targets)| targets.len() == 2));

        let profile = SourceId::Schmiedmann.profile();
        let contexts = profile.contexts();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].0.era, "E28");
        assert_eq!(contexts[0].1.len(), 4);
    }

    #[test]
    fn test_record_kinds() {
        assert_eq!(SourceId::Spareto.profile().record_kind, RecordKind::Legacy);
        assert_eq!(SourceId::FcpEuro.profile().record_kind, RecordKind::Legacy);
        assert_eq!(SourceId::Schmiedmann.profile().record_kind, RecordKind::Listing);
        assert_eq!(SourceId::Schmiedmann.profile().usd_rate, Some(1.08));
    }

    #[test]
    fn test_with_base_url() {
        let profile = SourceId::RockAuto.profile().with_base_url("http://127.0.0.1:9999/");
        assert_eq!(
            profile.target_url(&profile.targets[0]),
            "http://127.0.0.1:9999/en/mbmw,840313,e28/1987,parts/,5-series.html"
        );
    }

    #[test]
    fn test_context_display() {
        assert_eq!(QueryContext::new("United", Some("jerseys")).to_string(), "United/jerseys");
        assert_eq!(QueryContext::new("E28", None).to_string(), "E28");
    }
}
