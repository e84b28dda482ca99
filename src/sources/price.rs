//! Locale-aware price parsing with fixed-rate conversion into USD.

/// Converts raw price text into a canonical USD amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceNormalizer {
    /// Multiplier into USD, `None` when the source already quotes USD.
    rate: Option<f64>,
}

impl PriceNormalizer {
    /// Normalizer for sources quoting the reference currency.
    pub fn canonical() -> Self {
        Self { rate: None }
    }

    /// Normalizer applying a fixed conversion rate.
    pub fn converting(rate: f64) -> Self {
        Self { rate: Some(rate) }
    }

    /// Builds a normalizer from an optional rate.
    pub fn with_rate(rate: Option<f64>) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Parses and converts price text. Unparseable input yields `0.0`.
    pub fn normalize(&self, text: Option<&str>) -> f64 {
        text.and_then(parse_amount).map(|amount| self.convert(amount)).unwrap_or(0.0)
    }

    /// Converts an amount already in source currency.
    pub fn convert(&self, amount: f64) -> f64 {
        match self.rate {
            Some(rate) => round_cents(amount * rate),
            None => amount,
        }
    }
}

impl Default for PriceNormalizer {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Parses a price amount in source currency.
///
/// Ranges keep their lower bound. When both `.` and `,` appear the later one
/// is the decimal separator; a lone comma is decimal only when it is followed
/// by exactly two digits at the end.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
        .collect();

    // "25-40" -> "25"
    let lower = cleaned.split('-').next().unwrap_or_default().trim();
    if lower.is_empty() {
        return None;
    }

    let normalized = match (lower.rfind('.'), lower.rfind(',')) {
        (Some(dot), Some(comma)) if dot > comma => lower.replace(',', ""),
        (Some(_), Some(_)) => lower.replace('.', "").replace(',', "."),
        (None, Some(_)) if is_decimal_comma(lower) => lower.replace(',', "."),
        (None, Some(_)) => lower.replace(',', ""),
        _ => lower.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn is_decimal_comma(text: &str) -> bool {
    if text.matches(',').count() != 1 {
        return false;
    }
    text.split_once(',')
        .is_some_and(|(_, tail)| tail.len() == 2 && tail.chars().all(|c| c.is_ascii_digit()))
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
