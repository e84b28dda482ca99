//! Synthetic records emitted when a target context yields nothing live.
//!
//! Curated demo sets exist for the storefront and parts sources that block
//! most aggressively; every other context gets a small deterministic set built
//! from the context itself, so a blocked context is never empty.

use crate::pipeline::record::{slug, RawRecord, RecordKind};
use crate::sources::catalog::{Heuristics, QueryContext, SourceId, SourceProfile};
use crate::sources::heuristics::{categorize_part, team_for_era};
use crate::sources::price::PriceNormalizer;

struct DemoCollectible {
    title: &'static str,
    price: f64,
    team: &'static str,
    year: &'static str,
    size: &'static str,
}

struct DemoPart {
    title: &'static str,
    /// Price in source currency.
    price: f64,
    path: &'static str,
    image: &'static str,
    description_en: &'static str,
    description_he: &'static str,
}

const ALIEXPRESS_DEMOS: &[(&str, &str, &[DemoCollectible])] = &[
    (
        "jerseys",
        "United",
        &[
            DemoCollectible {
                title: "Cristiano Ronaldo Manchester United Home Jersey 2021-22",
                price: 89.99,
                team: "Manchester United",
                year: "2021",
                size: "L",
            },
            DemoCollectible {
                title: "Ronaldo #7 Manchester United Away Jersey",
                price: 75.50,
                team: "Manchester United",
                year: "2022",
                size: "M",
            },
        ],
    ),
    (
        "jerseys",
        "Madrid",
        &[
            DemoCollectible {
                title: "Cristiano Ronaldo Real Madrid Home Jersey 2016-17",
                price: 99.99,
                team: "Real Madrid",
                year: "2017",
                size: "L",
            },
            DemoCollectible {
                title: "Ronaldo #7 Real Madrid Champions League Jersey",
                price: 120.00,
                team: "Real Madrid",
                year: "2018",
                size: "XL",
            },
        ],
    ),
    (
        "memorabilia",
        "General",
        &[DemoCollectible {
            title: "Cristiano Ronaldo Signed Photo with COA",
            price: 299.99,
            team: "General",
            year: "2023",
            size: "8x10",
        }],
    ),
];

const SCHMIEDMANN_DEMOS: &[(&str, &[DemoPart])] = &[
    (
        "E28",
        &[
            DemoPart {
                title: "BMW E28 OE Brake Disc Set Front - Schmiedmann",
                price: 89.99,
                path: "/en/bmw-E28/demo-brake-disc.html",
                image: "https://via.placeholder.com/300x300/1E90FF/FFFFFF?text=BMW+E28+Brake+Disc",
                description_en: "Original Equipment brake disc set for BMW E28 front axle. High quality replacement part from Schmiedmann.",
                description_he: "סט דיסקי בלמים מקוריים עבור BMW E28 ציר קדמי. חלק חלופי באיכות גבוהה מ-Schmiedmann.",
            },
            DemoPart {
                title: "BMW E28 Engine Oil Filter - Mann Filter",
                price: 24.50,
                path: "/en/bmw-E28/demo-oil-filter.html",
                image: "https://via.placeholder.com/300x300/32CD32/FFFFFF?text=BMW+E28+Oil+Filter",
                description_en: "Mann-Filter oil filter for BMW E28 engines. Premium quality filtration for optimal engine protection.",
                description_he: "מסנן שמן Mann-Filter עבור מנועי BMW E28. סינון באיכות פרמיום להגנה אופטימלית על המנוע.",
            },
            DemoPart {
                title: "BMW E28 Interior Door Handle Set - Left/Right",
                price: 65.75,
                path: "/en/bmw-E28/demo-door-handle.html",
                image: "https://via.placeholder.com/300x300/FF6347/FFFFFF?text=BMW+E28+Door+Handle",
                description_en: "Complete interior door handle set for BMW E28. Includes left and right side handles with mounting hardware.",
                description_he: "סט ידיות דלת פנימיות שלם עבור BMW E28. כולל ידיות צד שמאל וימין עם חומרת הרכבה.",
            },
        ],
    ),
    (
        "F10",
        &[
            DemoPart {
                title: "BMW F10 M Performance Carbon Fiber Spoiler",
                price: 299.99,
                path: "/en/bmw-f10/demo-carbon-spoiler.html",
                image: "https://via.placeholder.com/300x300/800080/FFFFFF?text=BMW+F10+Spoiler",
                description_en: "M Performance carbon fiber rear spoiler for BMW F10 5-Series. Genuine BMW accessory for enhanced aerodynamics.",
                description_he: "ספויילר אחורי מסיבי פחמן M Performance עבור BMW F10 5-Series. אביזר BMW מקורי לשיפור האווירודינמיקה.",
            },
            DemoPart {
                title: "BMW F10 LED Angel Eyes Headlight Set",
                price: 450.00,
                path: "/en/bmw-f10/demo-led-headlights.html",
                image: "https://via.placeholder.com/300x300/FFD700/000000?text=BMW+F10+LED+Lights",
                description_en: "LED Angel Eyes headlight set for BMW F10. Modern LED technology with adaptive lighting functionality.",
                description_he: "סט פנסי ראש LED Angel Eyes עבור BMW F10. טכנולוגיית LED מודרנית עם פונקציונליות תאורה אדפטיבית.",
            },
            DemoPart {
                title: "BMW F10 Adaptive Suspension Strut - Front",
                price: 189.95,
                path: "/en/bmw-f10/demo-suspension-strut.html",
                image: "https://via.placeholder.com/300x300/4169E1/FFFFFF?text=BMW+F10+Suspension",
                description_en: "Adaptive suspension strut for BMW F10 front axle. Electronic damping control for superior ride comfort.",
                description_he: "תומך מתלה אדפטיבי עבור BMW F10 ציר קדמי. בקרת בולם אלקטרונית לנוחות נסיעה מעולה.",
            },
        ],
    ),
];

/// Generic parts used when a source has no curated set. Prices in USD.
const GENERIC_PARTS: &[(&str, f64)] = &[("Engine Oil Filter", 19.99), ("Front Brake Pad Set", 54.99)];

/// Generic collectible variants. Prices in USD.
const GENERIC_COLLECTIBLES: &[(&str, f64)] = &[("", 49.99), (" Collector Edition", 129.99)];

/// Produces synthetic records for one source.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    source: SourceId,
    base_url: String,
    kind: RecordKind,
    heuristics: Heuristics,
    normalizer: PriceNormalizer,
    brand: String,
}

impl FallbackGenerator {
    pub fn for_profile(profile: &SourceProfile) -> Self {
        Self {
            source: profile.id,
            base_url: profile.base_url.trim_end_matches('/').to_string(),
            kind: profile.record_kind,
            heuristics: profile.heuristics,
            normalizer: PriceNormalizer::with_rate(profile.usd_rate),
            brand: profile.title_brand.clone().unwrap_or_else(|| "BMW".to_string()),
        }
    }

    /// Synthetic records for a context. Never empty.
    pub fn generate(&self, context: &QueryContext) -> Vec<RawRecord> {
        let records = match self.source {
            SourceId::AliExpress => self.curated_collectibles(context),
            SourceId::Schmiedmann => self.curated_parts(context),
            _ => Vec::new(),
        };

        let records = if records.is_empty() {
            match self.heuristics {
                Heuristics::Memorabilia(_) => self.generic_collectibles(context),
                Heuristics::Parts => self.generic_parts(context),
            }
        } else {
            records
        };

        records.into_iter().map(RawRecord::synthetic).collect()
    }

    fn curated_collectibles(&self, context: &QueryContext) -> Vec<RawRecord> {
        let category = context.category.as_deref().unwrap_or_default();
        let Some((_, _, items)) = ALIEXPRESS_DEMOS
            .iter()
            .find(|(cat, era, _)| *cat == category && *era == context.era)
        else {
            return Vec::new();
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let url = format!("{}/item/demo-{}-{}-{}.html", self.base_url, category, context.era, i);
                let image = format!(
                    "https://via.placeholder.com/400x400/ff0000/ffffff?text=Ronaldo+{}",
                    title_case(category)
                );
                self.base(item.title, item.price, url, context)
                    .with("img_url", image)
                    .with("team", item.team)
                    .with("year", item.year)
                    .with("size", item.size)
                    .with("condition", "New")
                    .with("authenticity", "Unverified")
            })
            .collect()
    }

    fn curated_parts(&self, context: &QueryContext) -> Vec<RawRecord> {
        let Some((_, parts)) = SCHMIEDMANN_DEMOS.iter().find(|(series, _)| *series == context.era)
        else {
            return Vec::new();
        };

        parts
            .iter()
            .map(|part| {
                let url = format!("{}{}", self.base_url, part.path);
                self.base(part.title, self.normalizer.convert(part.price), url, context)
                    .with("img_url", part.image)
                    .with("category", categorize_part(part.title))
                    .with("description_en", part.description_en)
                    .with("description_he", part.description_he)
            })
            .collect()
    }

    fn generic_collectibles(&self, context: &QueryContext) -> Vec<RawRecord> {
        let category = context.category.as_deref().unwrap_or("memorabilia");
        let team = team_for_era(&context.era);
        let subject = if team == "General" {
            format!("Cristiano Ronaldo {}", item_noun(category))
        } else {
            format!("Cristiano Ronaldo {} {}", team, item_noun(category))
        };

        GENERIC_COLLECTIBLES
            .iter()
            .enumerate()
            .map(|(i, (suffix, price))| {
                let title = format!("{}{}", subject, suffix);
                let url = self.demo_url(context, i);
                self.base(&title, *price, url, context)
                    .with("team", team.as_str())
                    .with("condition", "Unknown")
                    .with("authenticity", "Unverified")
            })
            .collect()
    }

    fn generic_parts(&self, context: &QueryContext) -> Vec<RawRecord> {
        GENERIC_PARTS
            .iter()
            .enumerate()
            .map(|(i, (part, price))| {
                let title = format!("{} {} {}", self.brand, context.era, part);
                let url = self.demo_url(context, i);
                self.base(&title, *price, url, context).with("category", categorize_part(&title))
            })
            .collect()
    }

    fn demo_url(&self, context: &QueryContext, index: usize) -> String {
        format!("{}/demo/{}-{}-{}", self.base_url, self.source.id(), slug(&context.to_string()), index)
    }

    /// Fields shared by every synthetic record, keyed by record kind.
    fn base(&self, title: &str, price: f64, url: String, context: &QueryContext) -> RawRecord {
        let mut record = RawRecord::new(self.kind)
            .with("title_en", title)
            .with("price", price)
            .with("source", self.source.label())
            .with("description_en", format!("Demo: {} - This is demonstration data.", title))
            .with("description_he", format!("דמו: {} - זהו מידע הדגמה.", title));

        match self.kind {
            RecordKind::Legacy => {
                record.set("legacy_url", url);
                record.set("series", context.era.as_str());
            }
            _ => {
                record.set("item_url", url);
                record.set("era", context.era.as_str());
                record.set_opt("category", context.category.as_deref());
            }
        }
        record
    }
}

fn item_noun(category: &str) -> String {
    match category {
        "jerseys" => "Jersey".to_string(),
        "signed_items" => "Signed Item".to_string(),
        "cards" => "Trading Card".to_string(),
        "boots" => "Boots".to_string(),
        other => title_case(other),
    }
}

fn title_case(text: &str) -> String {
    text.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
