//! Raw extracted records and the canonical shapes they are validated into.

use crate::sources::catalog::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Field name to value map, the unit of storage.
pub type Document = Map<String, Value>;

/// Which persistence path a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Listing,
    Legacy,
    Narrative,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Listing => write!(f, "listing"),
            RecordKind::Legacy => write!(f, "legacy"),
            RecordKind::Narrative => write!(f, "narrative"),
        }
    }
}

/// Whether a record came from a live page or the fallback generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    #[default]
    Live,
    Synthetic,
}

/// One extracted item before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Set by producers that know the record shape.
    pub kind: Option<RecordKind>,
    pub provenance: Provenance,
    pub fields: Document,
}

impl RawRecord {
    /// Creates an empty record stamped with a kind.
    pub fn new(kind: RecordKind) -> Self {
        Self { kind: Some(kind), ..Self::default() }
    }

    /// Creates a record with no kind stamp.
    pub fn untyped(fields: Document) -> Self {
        Self { kind: None, provenance: Provenance::Live, fields }
    }

    pub fn synthetic(mut self) -> Self {
        self.provenance = Provenance::Synthetic;
        self
    }

    pub fn is_synthetic(&self) -> bool {
        self.provenance == Provenance::Synthetic
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Sets the field only when a value is present.
    pub fn set_opt(&mut self, key: &str, value: Option<impl Into<Value>>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    /// Field presence, regardless of value.
    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Non-empty trimmed string value.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()),
            _ => None,
        }
    }

    /// Owned text, also accepting numbers (years are sometimes numeric).
    pub fn text_owned(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::Number(n) => Some(n.to_string()),
            _ => self.text(key).map(str::to_string),
        }
    }

    /// Numeric value, also accepting numeric strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Reasons a record is rejected by the router.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("price must be positive, got {0}")]
    InvalidPrice(f64),

    #[error("unknown source `{0}`")]
    UnknownSource(String),
}

fn required_title(record: &RawRecord) -> Result<String, ValidationError> {
    record.text("title_en").map(str::to_string).ok_or(ValidationError::MissingField("title_en"))
}

fn required_price(record: &RawRecord) -> Result<f64, ValidationError> {
    let price = record.number("price").ok_or(ValidationError::MissingField("price"))?;
    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(ValidationError::InvalidPrice(price))
    }
}

fn required_source(record: &RawRecord) -> Result<SourceId, ValidationError> {
    let source = record.text("source").ok_or(ValidationError::MissingField("source"))?;
    source.parse().map_err(|_| ValidationError::UnknownSource(source.to_string()))
}

/// Lowercase, hyphen-separated form of a title for synthesized keys.
pub fn slug(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// A validated listing keyed by `item_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalListing {
    pub title_en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_he: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    pub item_url: String,
    pub source: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub era: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_he: Option<String>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub synthetic: bool,
}

impl CanonicalListing {
    /// Validates a raw record. A missing `item_url` is replaced by a stable
    /// `urn:listing:` key derived from the title.
    pub fn from_record(record: &RawRecord, fetched_at: DateTime<Utc>) -> Result<Self, ValidationError> {
        let title_en = required_title(record)?;
        let price = required_price(record)?;
        let source = required_source(record)?;
        let item_url = record
            .text("item_url")
            .map(str::to_string)
            .unwrap_or_else(|| format!("urn:listing:{}", slug(&title_en)));

        Ok(Self {
            title_he: record.text_owned("title_he"),
            img_url: record.text_owned("img_url"),
            era: record.text_owned("era"),
            category: record.text_owned("category"),
            team: record.text_owned("team"),
            year: record.text_owned("year"),
            size: record.text_owned("size"),
            condition: record.text_owned("condition"),
            authenticity: record.text_owned("authenticity"),
            description_en: record.text_owned("description_en"),
            description_he: record.text_owned("description_he"),
            synthetic: record.is_synthetic(),
            title_en,
            price,
            item_url,
            source,
            fetched_at,
        })
    }
}

/// Predecessor listing shape keyed by `legacy_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyListing {
    pub title_en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_he: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    pub legacy_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    pub source: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_en: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_he: Option<String>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub synthetic: bool,
}

impl LegacyListing {
    pub fn from_record(record: &RawRecord, fetched_at: DateTime<Utc>) -> Result<Self, ValidationError> {
        let title_en = required_title(record)?;
        let price = required_price(record)?;
        let source = required_source(record)?;
        let legacy_url = record
            .text("legacy_url")
            .map(str::to_string)
            .unwrap_or_else(|| format!("urn:legacy:{}", slug(&title_en)));

        Ok(Self {
            title_he: record.text_owned("title_he"),
            img_url: record.text_owned("img_url"),
            series: record.text_owned("series"),
            description_en: record.text_owned("description_en"),
            description_he: record.text_owned("description_he"),
            synthetic: record.is_synthetic(),
            title_en,
            price,
            legacy_url,
            source,
            fetched_at,
        })
    }
}

/// Kind of narrative story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryType {
    Milestone,
    Record,
    Match,
    Personal,
    Quote,
    Trivia,
    General,
}

impl StoryType {
    /// Default importance on a 1-10 scale.
    pub fn importance(&self) -> u8 {
        match self {
            StoryType::Milestone => 9,
            StoryType::Record => 8,
            StoryType::Match => 7,
            StoryType::Personal => 6,
            StoryType::Quote => 5,
            StoryType::Trivia => 4,
            StoryType::General => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoryType::Milestone => "milestone",
            StoryType::Record => "record",
            StoryType::Match => "match",
            StoryType::Personal => "personal",
            StoryType::Quote => "quote",
            StoryType::Trivia => "trivia",
            StoryType::General => "general",
        }
    }
}

impl FromStr for StoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "milestone" => Ok(StoryType::Milestone),
            "record" => Ok(StoryType::Record),
            "match" => Ok(StoryType::Match),
            "personal" => Ok(StoryType::Personal),
            "quote" => Ok(StoryType::Quote),
            "trivia" => Ok(StoryType::Trivia),
            "general" => Ok(StoryType::General),
            _ => Err(format!("Unknown story type: {}", s)),
        }
    }
}

impl fmt::Display for StoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A narrative story keyed by `title_en`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRecord {
    pub title_en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_he: Option<String>,
    #[serde(default)]
    pub content_en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_he: Option<String>,
    #[serde(default)]
    pub summary_en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_he: Option<String>,
    pub story_type: StoryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub era: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_relevance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub importance_score: u8,
    #[serde(default)]
    pub related_search_terms: String,
}

impl NarrativeRecord {
    /// Validates a raw narrative. Unknown story types fall back to trivia.
    pub fn from_record(record: &RawRecord) -> Result<Self, ValidationError> {
        let title_en = required_title(record)?;
        let story_type = record
            .text("story_type")
            .and_then(|s| s.parse().ok())
            .unwrap_or(StoryType::Trivia);
        let importance_score = record
            .number("importance_score")
            .filter(|n| n.is_finite())
            .map(|n| n.clamp(1.0, 10.0) as u8)
            .unwrap_or_else(|| story_type.importance());

        Ok(Self {
            title_he: record.text_owned("title_he"),
            content_en: record.text_owned("content_en").unwrap_or_default(),
            content_he: record.text_owned("content_he"),
            summary_en: record.text_owned("summary_en").unwrap_or_default(),
            summary_he: record.text_owned("summary_he"),
            era: record.text_owned("era"),
            team: record.text_owned("team"),
            year: record.text_owned("year"),
            category_relevance: record.text_owned("category_relevance"),
            media_url: record.text_owned("media_url"),
            source_url: record.text_owned("source_url"),
            related_search_terms: record.text_owned("related_search_terms").unwrap_or_default(),
            title_en,
            story_type,
            importance_score,
        })
    }
}

/// Serializes a canonical shape into a storable document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Ok(map)
        }
    }
}

/// Deserializes a stored document back into a canonical shape.
pub fn from_document<T: serde::de::DeserializeOwned>(document: Document) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(document))
}
