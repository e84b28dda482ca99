//! Generic source extractor driven by a [`SourceProfile`].
//!
//! For each target the extractor fetches pages with retry, checks them for
//! blocking, resolves item fields with rule chains and normalizes prices.
//! A context that produces no live record gets the synthetic fallback set.

use crate::pipeline::record::{RawRecord, RecordKind};
use crate::sources::blocking::{BlockReason, BlockingDetector, Verdict};
use crate::sources::catalog::{Heuristics, QueryContext, SourceId, SourceProfile, Target};
use crate::sources::client::{fetch_with_retry, PageFetcher};
use crate::sources::fallback::FallbackGenerator;
use crate::sources::heuristics::{
    categorize_part, enhance_title, extract_size, extract_year, team_for_era,
};
use crate::sources::price::PriceNormalizer;
use crate::sources::rules::{ContainerRules, RuleChain, RuleError};
use async_trait::async_trait;
use regex_lite::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, info, warn};
use url::Url;

/// Receives records as the extractor produces them.
#[async_trait]
pub trait RecordSink: Send {
    async fn accept(&mut self, record: RawRecord);
}

#[async_trait]
impl RecordSink for Vec<RawRecord> {
    async fn accept(&mut self, record: RawRecord) {
        self.push(record);
    }
}

/// Result of parsing one page.
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub records: Vec<RawRecord>,
    /// Containers found but rejected.
    pub dropped: usize,
    /// Containers matched by the winning container selector.
    pub containers: usize,
    pub next_page: Option<String>,
}

/// How a target ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Harvested,
    Blocked(BlockReason),
    Failed(String),
    Empty,
}

/// Per-target harvest summary.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub url: String,
    pub context: QueryContext,
    pub pages: u32,
    pub records: usize,
    pub dropped: usize,
    pub outcome: TargetOutcome,
}

/// Per-source harvest summary.
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub source: SourceId,
    pub targets: Vec<TargetReport>,
    pub live: usize,
    pub synthetic: usize,
}

impl HarvestReport {
    fn new(source: SourceId) -> Self {
        Self { source, targets: Vec::new(), live: 0, synthetic: 0 }
    }

    pub fn total(&self) -> usize {
        self.live + self.synthetic
    }

    pub fn dropped(&self) -> usize {
        self.targets.iter().map(|t| t.dropped).sum()
    }

    pub fn blocked(&self) -> usize {
        self.targets.iter().filter(|t| matches!(t.outcome, TargetOutcome::Blocked(_))).count()
    }

    pub fn failed(&self) -> usize {
        self.targets.iter().filter(|t| matches!(t.outcome, TargetOutcome::Failed(_))).count()
    }
}

/// Why an item container was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingTitle,
    SkippedTitle,
    MissingPrice,
    MissingUrl,
}

impl Rejection {
    fn as_str(&self) -> &'static str {
        match self {
            Rejection::MissingTitle => "missing title",
            Rejection::SkippedTitle => "skipped title",
            Rejection::MissingPrice => "missing or zero price",
            Rejection::MissingUrl => "missing item URL",
        }
    }
}

/// Extracts listings from one source.
pub struct SourceExtractor {
    profile: SourceProfile,
    containers: ContainerRules,
    title: RuleChain,
    price: RuleChain,
    link: RuleChain,
    image: RuleChain,
    next_page: RuleChain,
    image_rewrites: Vec<(Regex, String)>,
    normalizer: PriceNormalizer,
    detector: BlockingDetector,
    fallback: FallbackGenerator,
}

impl SourceExtractor {
    /// Compiles every rule in the profile.
    pub fn new(profile: SourceProfile) -> Result<Self, RuleError> {
        let image_rewrites = profile
            .image_rewrites
            .iter()
            .map(|rewrite| {
                Regex::new(&rewrite.pattern)
                    .map(|regex| (regex, rewrite.replacement.clone()))
                    .map_err(|e| RuleError::Pattern {
                        pattern: rewrite.pattern.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            containers: ContainerRules::parse(&profile.containers)?,
            title: RuleChain::parse(&profile.fields.title)?,
            price: RuleChain::parse(&profile.fields.price)?,
            link: RuleChain::parse(&profile.fields.link)?,
            image: RuleChain::parse(&profile.fields.image)?,
            next_page: RuleChain::parse(&profile.fields.next_page)?,
            image_rewrites,
            normalizer: PriceNormalizer::with_rate(profile.usd_rate),
            detector: BlockingDetector::new().with_extra(&profile.extra_indicators),
            fallback: FallbackGenerator::for_profile(&profile),
            profile,
        })
    }

    pub fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    /// Parses one page into records.
    pub fn parse_page(&self, html: &str, page_url: &str, context: &QueryContext) -> PageExtraction {
        let document = Html::parse_document(html);
        let next_page = self
            .next_page
            .resolve(document.root_element())
            .and_then(|href| absolutize(page_url, &href));

        let Some((selector, containers)) = self.containers.find(&document) else {
            debug!("{}: no item containers on {}", self.profile.id, page_url);
            return PageExtraction { next_page, ..PageExtraction::default() };
        };
        debug!("{}: {} containers via `{}`", self.profile.id, containers.len(), selector);

        let limit = self.profile.max_items_per_page.unwrap_or(usize::MAX);
        let mut extraction =
            PageExtraction { containers: containers.len(), next_page, ..PageExtraction::default() };

        for container in containers.into_iter().take(limit) {
            match self.parse_item(container, page_url, context) {
                Ok(record) => extraction.records.push(record),
                Err(reason) => {
                    warn!("{}: dropped item on {} ({})", self.profile.id, page_url, reason.as_str());
                    extraction.dropped += 1;
                }
            }
        }

        extraction
    }

    fn parse_item(
        &self,
        container: ElementRef<'_>,
        page_url: &str,
        context: &QueryContext,
    ) -> Result<RawRecord, Rejection> {
        let profile = &self.profile;

        let title = self.title.resolve(container).ok_or(Rejection::MissingTitle)?;
        if profile.skip_titles.iter().any(|skip| title.contains(skip.as_str())) {
            return Err(Rejection::SkippedTitle);
        }

        let price = self.normalizer.normalize(self.price.resolve(container).as_deref());
        if price <= 0.0 {
            return Err(Rejection::MissingPrice);
        }

        let must_contain = profile.link_must_contain.as_deref();
        let url = self
            .link
            .resolve_where(container, |href| must_contain.map_or(true, |m| href.contains(m)))
            .and_then(|href| absolutize(page_url, &href))
            .ok_or(Rejection::MissingUrl)?;

        let title = match &profile.title_brand {
            Some(brand) => enhance_title(&title, brand, &context.era),
            None => title,
        };

        let image = self
            .image
            .resolve(container)
            .map(|src| self.rewrite_image(&src))
            .and_then(|src| absolutize(page_url, &src))
            .or_else(|| profile.placeholder_image.clone());

        let mut record = RawRecord::new(profile.record_kind)
            .with("title_en", title.as_str())
            .with("price", price)
            .with("source", profile.id.label());
        record.set_opt("img_url", image);
        record.set_opt("authenticity", profile.authenticity.as_deref());

        let category = match profile.heuristics {
            Heuristics::Memorabilia(style) => {
                record.set("team", team_for_era(&context.era));
                record.set_opt("year", extract_year(&title));
                record.set_opt("size", extract_size(&title));
                record.set("condition", style.classify(&title));
                context.category.clone()
            }
            Heuristics::Parts => Some(categorize_part(&title).to_string()),
        };

        match profile.record_kind {
            RecordKind::Legacy => {
                record.set("legacy_url", url);
                record.set("series", context.era.as_str());
            }
            _ => {
                record.set("item_url", url);
                record.set("era", context.era.as_str());
                record.set_opt("category", category.as_deref());
            }
        }

        let fill = |template: &str| {
            render_template(template, &title, context, category.as_deref(), profile.id)
        };
        record.set("description_en", fill(&profile.descriptions.en));
        record.set_opt("description_he", profile.descriptions.he.as_deref().map(fill));

        Ok(record)
    }

    fn rewrite_image(&self, src: &str) -> String {
        self.image_rewrites
            .iter()
            .fold(src.to_string(), |acc, (regex, replacement)| {
                regex.replace_all(&acc, replacement.as_str()).into_owned()
            })
    }

    /// Harvests one target, following pagination while pages yield records.
    pub async fn harvest_target(
        &self,
        fetcher: &dyn PageFetcher,
        target: &Target,
        sink: &mut dyn RecordSink,
    ) -> TargetReport {
        let start = self.profile.target_url(target);
        let mut report = TargetReport {
            url: start.clone(),
            context: target.context.clone(),
            pages: 0,
            records: 0,
            dropped: 0,
            outcome: TargetOutcome::Empty,
        };

        let mut url = start;
        let mut stopped = None;
        for _ in 0..self.profile.max_pages.max(1) {
            let page = match fetch_with_retry(fetcher, &url, &self.profile.politeness.retry).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("{}: {}", self.profile.id, e);
                    stopped = Some(TargetOutcome::Failed(e.to_string()));
                    break;
                }
            };

            if let Verdict::Blocked(reason) = self.detector.classify_page(&page) {
                warn!("{}: blocked on {} ({})", self.profile.id, url, reason);
                stopped = Some(TargetOutcome::Blocked(reason));
                break;
            }

            let extraction = self.parse_page(&page.body, &page.url, &target.context);
            report.pages += 1;
            report.dropped += extraction.dropped;
            info!(
                "{}: page {} of {} yielded {} items ({} dropped)",
                self.profile.id,
                report.pages,
                target.context,
                extraction.records.len(),
                extraction.dropped
            );

            if extraction.records.is_empty() {
                break;
            }
            for record in extraction.records {
                sink.accept(record).await;
                report.records += 1;
            }

            match extraction.next_page {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        report.outcome = if report.records > 0 {
            TargetOutcome::Harvested
        } else {
            stopped.unwrap_or(TargetOutcome::Empty)
        };
        report
    }

    /// Harvests every target of the profile, emitting fallback records for
    /// contexts that produced nothing live.
    pub async fn harvest(&self, fetcher: &dyn PageFetcher, sink: &mut dyn RecordSink) -> HarvestReport {
        let mut report = HarvestReport::new(self.profile.id);

        for (context, targets) in self.profile.contexts() {
            let mut live = 0;
            for target in targets {
                let target_report = self.harvest_target(fetcher, target, sink).await;
                live += target_report.records;
                report.targets.push(target_report);
            }
            report.live += live;

            if live == 0 {
                let synthetic = self.fallback.generate(&context);
                warn!(
                    "{}: no live items for {}, emitting {} synthetic",
                    self.profile.id,
                    context,
                    synthetic.len()
                );
                report.synthetic += synthetic.len();
                for record in synthetic {
                    sink.accept(record).await;
                }
            }
        }

        info!(
            "{}: {} live, {} synthetic, {} dropped",
            self.profile.id,
            report.live,
            report.synthetic,
            report.dropped()
        );
        report
    }
}

/// Resolves a possibly relative link against the page URL.
fn absolutize(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return None;
    }
    match Url::parse(page_url) {
        Ok(base) => base.join(href).ok().map(String::from),
        Err(_) => Url::parse(href).ok().map(String::from),
    }
}

fn render_template(
    template: &str,
    title: &str,
    context: &QueryContext,
    category: Option<&str>,
    source: SourceId,
) -> String {
    template
        .replace("{title}", title)
        .replace("{era}", &context.era)
        .replace("{category}", &category.unwrap_or("item").replace('_', " "))
        .replace("{source}", source.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::catalog::{Politeness, RetryPolicy};
    use crate::sources::client::testing::MockFetcher;

    const SCHMIEDMANN_PAGE: &str = r#"
        <html><body>
          <div class="product-inner">
            <div class="small-product-name">Oil Filter</div>
            <div class="product-price">€24,50</div>
            <a href="/p/1">Open</a>
          </div>
          <div class="product-inner">
            <div class="small-product-name">Headlight Washer</div>
            <div class="product-price">Call for price</div>
            <a href="/p/2">Open</a>
          </div>
          <div class="product-inner">
            <div class="small-product-name">BMW E28 Brake Disc</div>
            <div class="product-price">1.234,56 €</div>
            <a href="https://cdn.example.com/p/3">Open</a>
            <img src="/img/3.jpg">
          </div>
          <a rel="next" href="?page=2">Next</a>
        </body></html>
    "#;

    const EBAY_PAGE: &str = r#"
        <html><body><ul class="srp-results">
          <li class="s-item">
            <div class="s-item__title"><span>Shop on eBay</span></div>
            <span class="s-item__price">$20.00</span>
          </li>
          <li class="s-item">
            <div class="s-item__title"><span>Sponsored Ronaldo Jersey</span></div>
            <span class="s-item__price">$35.00</span>
            <a class="s-item__link" href="https://www.ebay.com/itm/9">x</a>
          </li>
          <li class="s-item">
            <div class="s-item__title"><span>Vintage Ronaldo Manchester United Jersey Size XL 2008</span></div>
            <span class="s-item__price">$120.00</span>
            <a class="s-item__link" href="https://www.ebay.com/itm/1">x</a>
            <div class="s-item__image-wrapper"><img src="https://i.ebayimg.com/images/g/abc/s-l64.jpg"></div>
          </li>
        </ul></body></html>
    "#;

    fn instant(mut profile: SourceProfile) -> SourceProfile {
        profile.politeness = Politeness {
            delay_ms: 0,
            delay_jitter_ms: 0,
            max_in_flight: 1,
            retry: RetryPolicy { backoff_ms: 0, ..RetryPolicy::default() },
        };
        profile
    }

    fn schmiedmann(base: &str) -> SourceProfile {
        instant(SourceId::Schmiedmann.profile().with_base_url(base).with_targets(vec![Target::new(
            "/en/bmw-E28/parts",
            QueryContext::new("E28", None),
        )]))
    }

    #[test]
    fn test_every_profile_compiles() {
        for id in SourceId::all() {
            assert!(SourceExtractor::new(id.profile()).is_ok(), "{} failed to compile", id);
        }
    }

    #[test]
    fn test_bad_rewrite_pattern_is_an_error() {
        let mut profile = SourceId::RockAuto.profile();
        profile.image_rewrites[0].pattern = "(".to_string();
        assert!(matches!(SourceExtractor::new(profile), Err(RuleError::Pattern { .. })));
    }

    #[test]
    fn test_parse_page_parts_source() {
        let extractor = SourceExtractor::new(schmiedmann("https://shop.test")).unwrap();
        let ctx = QueryContext::new("E28", None);
        let page = extractor.parse_page(SCHMIEDMANN_PAGE, "https://shop.test/en/bmw-E28/parts", &ctx);

        assert_eq!(page.containers, 3);
        assert_eq!(page.dropped, 1);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next_page.as_deref(), Some("https://shop.test/en/bmw-E28/parts?page=2"));

        let oil = &page.records[0];
        assert_eq!(oil.kind, Some(RecordKind::Listing));
        assert_eq!(oil.text("title_en"), Some("BMW E28 Oil Filter"));
        assert_eq!(oil.number("price"), Some(26.46));
        assert_eq!(oil.text("item_url"), Some("https://shop.test/p/1"));
        assert_eq!(oil.text("category"), Some("Mechanical"));
        assert_eq!(oil.text("era"), Some("E28"));
        assert_eq!(oil.text("source"), Some("Schmiedmann"));
        assert!(oil.text("img_url").unwrap().contains("placeholder"));
        assert_eq!(oil.text("description_en"), Some("BMW E28 part from Schmiedmann: BMW E28 Oil Filter"));

        let disc = &page.records[1];
        assert_eq!(disc.text("title_en"), Some("BMW E28 Brake Disc"));
        assert_eq!(disc.number("price"), Some(1333.32));
        assert_eq!(disc.text("item_url"), Some("https://cdn.example.com/p/3"));
        assert_eq!(disc.text("img_url"), Some("https://shop.test/img/3.jpg"));
    }

    #[test]
    fn test_parse_page_memorabilia_source() {
        let extractor = SourceExtractor::new(SourceId::Ebay.profile()).unwrap();
        let ctx = QueryContext::new("United", Some("jerseys"));
        let page = extractor.parse_page(EBAY_PAGE, "https://www.ebay.com/sch/i.html", &ctx);

        assert_eq!(page.dropped, 2);
        assert_eq!(page.records.len(), 1);

        let jersey = &page.records[0];
        assert_eq!(jersey.number("price"), Some(120.0));
        assert_eq!(jersey.text("team"), Some("Manchester United"));
        assert_eq!(jersey.text("year"), Some("2008"));
        assert_eq!(jersey.text("size"), Some("XL"));
        assert_eq!(jersey.text("condition"), Some("Vintage"));
        assert_eq!(jersey.text("category"), Some("jerseys"));
        assert_eq!(jersey.text("img_url"), Some("https://i.ebayimg.com/images/g/abc/s-l400.jpg"));
        assert_eq!(
            jersey.text("description_en"),
            Some("Cristiano Ronaldo jerseys from United era. Vintage Ronaldo Manchester United Jersey Size XL 2008")
        );
    }

    #[test]
    fn test_link_must_contain_and_item_cap() {
        let cards: String = (0..12)
            .map(|i| {
                format!(
                    r#"<div class="search-item-card-wrapper"><h3>Ronaldo Shirt {i}</h3>
                       <span class="price">US $1{i}.00</span>
                       <a href="/store/1">store</a><a href="/item/{i}.html">item</a></div>"#
                )
            })
            .collect();
        let html = format!("<html><body>{}</body></html>", cards);

        let extractor = SourceExtractor::new(SourceId::AliExpress.profile()).unwrap();
        let ctx = QueryContext::new("Madrid", Some("jerseys"));
        let page = extractor.parse_page(&html, "https://www.aliexpress.com/wholesale", &ctx);

        assert_eq!(page.containers, 12);
        assert_eq!(page.records.len(), 10);
        assert_eq!(page.records[0].text("item_url"), Some("https://www.aliexpress.com/item/0.html"));
        assert_eq!(page.records[0].text("condition"), Some("New"));
    }

    #[test]
    fn test_legacy_source_uses_legacy_fields() {
        let html = r#"<div class="card-product"><span class="name">Control Arm</span>
            <span class="card-product-price">$45.10</span><a href="/p/arm">x</a></div>"#;
        let extractor = SourceExtractor::new(SourceId::Spareto.profile()).unwrap();
        let ctx = QueryContext::new("F10", None);
        let page = extractor.parse_page(html, "https://www.spareto.com/products", &ctx);

        let record = &page.records[0];
        assert_eq!(record.kind, Some(RecordKind::Legacy));
        assert_eq!(record.text("legacy_url"), Some("https://www.spareto.com/p/arm"));
        assert_eq!(record.text("series"), Some("F10"));
        assert!(!record.has("item_url"));
    }

    #[test]
    fn test_image_rewrite_keeps_extension() {
        let extractor = SourceExtractor::new(SourceId::RockAuto.profile()).unwrap();
        assert_eq!(extractor.rewrite_image("/info/12/part_m.JPG"), "/info/12/part_l.JPG");
        assert_eq!(extractor.rewrite_image("/info/12/part_s.png"), "/info/12/part_l.png");
        assert_eq!(extractor.rewrite_image("/info/12/part.png"), "/info/12/part.png");
    }

    #[tokio::test]
    async fn test_harvest_follows_pagination() {
        let page_two = r#"<div class="product-inner"><h3>Fog Light</h3>
            <span class="price">€10,00</span><a href="/p/9">x</a></div>"#;
        let fetcher = MockFetcher::new()
            .page("https://shop.test/en/bmw-E28/parts", 200, SCHMIEDMANN_PAGE)
            .page("https://shop.test/en/bmw-E28/parts?page=2", 200, page_two);

        let extractor = SourceExtractor::new(schmiedmann("https://shop.test")).unwrap();
        let mut sink: Vec<RawRecord> = Vec::new();
        let report = extractor.harvest(&fetcher, &mut sink).await;

        assert_eq!(report.live, 3);
        assert_eq!(report.synthetic, 0);
        assert_eq!(report.targets[0].pages, 2);
        assert_eq!(report.targets[0].outcome, TargetOutcome::Harvested);
        assert_eq!(sink.len(), 3);
        assert_eq!(sink[2].text("category"), Some("Lighting"));
        assert!(sink.iter().all(|r| !r.is_synthetic()));
    }

    #[tokio::test]
    async fn test_blocked_target_falls_back() {
        let fetcher = MockFetcher::new().page(
            "https://shop.test/en/bmw-E28/parts",
            200,
            "<html><body>Please solve this CAPTCHA</body></html>",
        );

        let extractor = SourceExtractor::new(schmiedmann("https://shop.test")).unwrap();
        let mut sink: Vec<RawRecord> = Vec::new();
        let report = extractor.harvest(&fetcher, &mut sink).await;

        assert_eq!(report.live, 0);
        assert_eq!(report.synthetic, 3);
        assert_eq!(report.blocked(), 1);
        assert!(matches!(
            &report.targets[0].outcome,
            TargetOutcome::Blocked(BlockReason::Indicator(word)) if word == "captcha"
        ));
        assert!(sink.iter().all(RawRecord::is_synthetic));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_status_falls_back() {
        let fetcher = MockFetcher::new().page("https://shop.test/en/bmw-E28/parts", 403, "nope");

        let extractor = SourceExtractor::new(schmiedmann("https://shop.test")).unwrap();
        let mut sink: Vec<RawRecord> = Vec::new();
        let report = extractor.harvest(&fetcher, &mut sink).await;

        assert_eq!(report.targets[0].outcome, TargetOutcome::Blocked(BlockReason::Status(403)));
        assert!(!sink.is_empty());
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back() {
        let fetcher = MockFetcher::new().page("https://shop.test/en/bmw-E28/parts", 503, "");

        let extractor = SourceExtractor::new(schmiedmann("https://shop.test")).unwrap();
        let mut sink: Vec<RawRecord> = Vec::new();
        let report = extractor.harvest(&fetcher, &mut sink).await;

        assert_eq!(fetcher.call_count(), 3);
        assert_eq!(report.targets[0].outcome, TargetOutcome::Blocked(BlockReason::Status(503)));
        assert_eq!(report.synthetic, 3);
    }

    #[tokio::test]
    async fn test_empty_page_falls_back() {
        let fetcher =
            MockFetcher::new().page("https://shop.test/en/bmw-E28/parts", 200, "<html><body></body></html>");

        let extractor = SourceExtractor::new(schmiedmann("https://shop.test")).unwrap();
        let mut sink: Vec<RawRecord> = Vec::new();
        let report = extractor.harvest(&fetcher, &mut sink).await;

        assert_eq!(report.targets[0].outcome, TargetOutcome::Empty);
        assert_eq!(report.total(), 3);
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize("https://a.test/x/y", "/p/1").as_deref(), Some("https://a.test/p/1"));
        assert_eq!(absolutize("https://a.test/x/y", "z").as_deref(), Some("https://a.test/x/z"));
        assert_eq!(absolutize("https://a.test/", "https://b.test/q").as_deref(), Some("https://b.test/q"));
        assert_eq!(absolutize("https://a.test/", "#"), None);
        assert_eq!(absolutize("not a url", "/p/1"), None);
    }
}
