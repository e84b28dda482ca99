//! Classifies fetched pages as blocked or usable.

use crate::sources::client::FetchedPage;
use std::fmt;

/// Indicators every source scans for.
pub const DEFAULT_INDICATORS: &[&str] =
    &["captcha", "forbidden", "access denied", "rate limit", "too many requests", "blocked"];

/// Why a page was considered blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// HTTP status of 400 or above.
    Status(u16),
    /// An indicator phrase was found in the body or final URL.
    Indicator(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Status(status) => write!(f, "HTTP {}", status),
            BlockReason::Indicator(word) => write!(f, "indicator \"{}\"", word),
        }
    }
}

/// Outcome of a blocking check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Usable,
    Blocked(BlockReason),
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Blocked(_))
    }
}

/// Scans responses for error statuses and anti-bot indicator phrases.
#[derive(Debug, Clone)]
pub struct BlockingDetector {
    indicators: Vec<String>,
}

impl BlockingDetector {
    /// Creates a detector with the default vocabulary.
    pub fn new() -> Self {
        Self { indicators: DEFAULT_INDICATORS.iter().map(|s| s.to_string()).collect() }
    }

    /// Extends the vocabulary with source-specific phrases.
    pub fn with_extra<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in extra {
            let word = word.as_ref().trim().to_lowercase();
            if !word.is_empty() && !self.indicators.contains(&word) {
                self.indicators.push(word);
            }
        }
        self
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    /// Classifies a response by status and body text.
    pub fn classify(&self, status: u16, text: &str) -> Verdict {
        if status >= 400 {
            return Verdict::Blocked(BlockReason::Status(status));
        }

        match self.find_indicator(text) {
            Some(word) => Verdict::Blocked(BlockReason::Indicator(word.to_string())),
            None => Verdict::Usable,
        }
    }

    /// Classifies a fetched page, also checking the final URL for redirects to block pages.
    pub fn classify_page(&self, page: &FetchedPage) -> Verdict {
        match self.classify(page.status, &page.body) {
            Verdict::Usable => match self.find_indicator(&page.url) {
                Some(word) => Verdict::Blocked(BlockReason::Indicator(word.to_string())),
                None => Verdict::Usable,
            },
            blocked => blocked,
        }
    }

    fn find_indicator(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.indicators.iter().find(|word| lower.contains(word.as_str())).map(|w| w.as_str())
    }
}

impl Default for BlockingDetector {
    fn default() -> Self {
        Self::new()
    }
}
