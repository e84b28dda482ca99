//! Price range filter.

use super::Filter;
use crate::pipeline::record::Document;

/// Filters documents by their `price` field.
pub struct PriceFilter {
    min: Option<f64>,
    max: Option<f64>,
}

impl PriceFilter {
    /// Creates a new price filter with optional min/max bounds.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Creates a filter with only minimum price.
    pub fn min(price: f64) -> Self {
        Self { min: Some(price), max: None }
    }

    /// Creates a filter with only maximum price.
    pub fn max(price: f64) -> Self {
        Self { min: None, max: Some(price) }
    }

    /// Creates a filter with both min and max.
    pub fn range(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }
}

impl Filter for PriceFilter {
    fn matches(&self, doc: &Document) -> bool {
        let Some(price) = doc.get("price").and_then(|v| v.as_f64()) else {
            return false;
        };

        if self.min.is_some_and(|min| price < min) {
            return false;
        }

        !self.max.is_some_and(|max| price > max)
    }

    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("Price: ${:.2} - ${:.2}", min, max),
            (Some(min), None) => format!("Price: >= ${:.2}", min),
            (None, Some(max)) => format!("Price: <= ${:.2}", max),
            (None, None) => "Price: any".to_string(),
        }
    }
}
