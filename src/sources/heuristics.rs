//! Title heuristics for secondary listing attributes.
//!
//! These never gate emission: a miss just leaves the attribute empty.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

static SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:XS|S|M|L|XL|XXL|\d+)\b").unwrap());

/// Part categories, most specific first.
const PART_CATEGORIES: &[(&str, &[&str])] = &[
    ("Lighting", &["light", "headlight", "taillight", "blinker", "fog"]),
    ("Wheels & Suspension", &["wheel", "suspension", "tie rod", "strut", "hub", "control arm"]),
    (
        "Interior",
        &["trim", "handle", "knob", "button", "switch", "console", "dash", "seat", "carpet", "shifter"],
    ),
    ("Exterior", &["bumper", "grille", "fender", "door", "mirror", "spoiler", "seal", "decal"]),
    ("Electronics", &["sensor", "camera", "radio", "computer", "obc", "harness", "actuator"]),
    (
        "Mechanical",
        &["engine", "radiator", "transmission", "brake", "exhaust", "pump", "thermostat", "filter"],
    ),
];

/// Fallback category for parts matching no keyword.
pub const MISC_CATEGORY: &str = "Miscellaneous";

static PART_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PART_CATEGORIES
        .iter()
        .map(|(category, keywords)| (*category, word_pattern(keywords)))
        .collect()
});

static COLLECTIBLE_CONDITIONS: LazyLock<ConditionRules> = LazyLock::new(|| {
    ConditionRules::new(
        &[
            (&["new", "brand new"], "New"),
            (&["used", "pre-owned"], "Used"),
            (&["vintage", "retro"], "Vintage"),
        ],
        "Unknown",
    )
});

static MARKETPLACE_CONDITIONS: LazyLock<ConditionRules> = LazyLock::new(|| {
    ConditionRules::new(
        &[
            (&["new", "brand new"], "New"),
            (&["used", "pre-owned"], "Used"),
            (&["replica", "fake"], "Replica"),
        ],
        "New",
    )
});

/// Builds a case-insensitive whole-word alternation. Keywords are escaped.
fn word_pattern(keywords: &[&str]) -> Regex {
    let alternation = keywords.iter().map(|k| regex_lite::escape(k)).collect::<Vec<_>>().join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).unwrap()
}

/// Keyword rules mapping a title to a condition label.
pub struct ConditionRules {
    rules: Vec<(Regex, &'static str)>,
    default: &'static str,
}

impl ConditionRules {
    fn new(rules: &[(&[&str], &'static str)], default: &'static str) -> Self {
        Self {
            rules: rules.iter().map(|(words, label)| (word_pattern(words), *label)).collect(),
            default,
        }
    }

    pub fn classify(&self, title: &str) -> &'static str {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(title))
            .map(|(_, label)| *label)
            .unwrap_or(self.default)
    }
}

/// Which condition vocabulary a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionStyle {
    /// Auction-style listings: new / used / vintage, otherwise unknown.
    Collectible,
    /// Storefront listings: new / used / replica, otherwise new.
    Marketplace,
}

impl ConditionStyle {
    pub fn classify(&self, title: &str) -> &'static str {
        match self {
            ConditionStyle::Collectible => COLLECTIBLE_CONDITIONS.classify(title),
            ConditionStyle::Marketplace => MARKETPLACE_CONDITIONS.classify(title),
        }
    }
}

/// Maps an era label to the team it refers to.
pub fn team_for_era(era: &str) -> String {
    match era {
        "Sporting" => "Sporting CP",
        "United" => "Manchester United",
        "Madrid" => "Real Madrid",
        "Juventus" => "Juventus",
        "Portugal" => "Portugal National Team",
        "Al-Nassr" => "Al-Nassr",
        other => other,
    }
    .to_string()
}

/// First four-digit year (19xx or 20xx) in the title.
pub fn extract_year(title: &str) -> Option<String> {
    YEAR.find(title).map(|m| m.as_str().to_string())
}

/// First clothing size or number token in the title.
pub fn extract_size(title: &str) -> Option<String> {
    SIZE.find(&title.to_uppercase()).map(|m| m.as_str().to_string())
}

/// Assigns a part category by whole-word keyword match.
pub fn categorize_part(title: &str) -> &'static str {
    PART_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(title))
        .map(|(category, _)| *category)
        .unwrap_or(MISC_CATEGORY)
}

/// Prefixes `brand series` unless the title already names either.
pub fn enhance_title(title: &str, brand: &str, series: &str) -> String {
    let title = title.trim();
    let upper = title.to_uppercase();
    if upper.contains(&brand.to_uppercase()) || upper.contains(&series.to_uppercase()) {
        title.to_string()
    } else {
        format!("{} {} {}", brand, series, title)
    }
}
