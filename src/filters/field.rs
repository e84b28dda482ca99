//! Equality filter on a single document field.

use super::Filter;
use crate::pipeline::record::Document;
use serde_json::Value;

/// Matches documents whose field equals a value, ignoring case.
pub struct FieldFilter {
    field: String,
    value: String,
}

impl FieldFilter {
    pub fn equals(field: &str, value: &str) -> Self {
        Self { field: field.to_string(), value: value.trim().to_lowercase() }
    }
}

impl Filter for FieldFilter {
    fn matches(&self, doc: &Document) -> bool {
        match doc.get(&self.field) {
            Some(Value::String(s)) => s.trim().to_lowercase() == self.value,
            Some(Value::Number(n)) => n.to_string() == self.value,
            _ => false,
        }
    }

    fn description(&self) -> String {
        format!("{} = {}", self.field, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_match() {
        let mut doc = Document::new();
        doc.insert("source".to_string(), Value::from("AliExpress"));
        doc.insert("year".to_string(), Value::from(2017));

        assert!(FieldFilter::equals("source", "aliexpress").matches(&doc));
        assert!(!FieldFilter::equals("source", "ebay").matches(&doc));
        assert!(FieldFilter::equals("year", "2017").matches(&doc));
        assert!(!FieldFilter::equals("team", "Juventus").matches(&doc));
    }

    #[test]
    fn test_description() {
        assert_eq!(FieldFilter::equals("era", "United").description(), "era = united");
    }
}
