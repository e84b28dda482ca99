//! Optional narrative enrichment over an HTTP JSON endpoint.

use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use wreq::Client;

/// What the enrichment service is asked to expand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichRequest {
    pub title: String,
    pub context: String,
    pub story_type: String,
    pub era: Option<String>,
}

/// Generated content. Missing fields leave the story untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnrichedContent {
    #[serde(default)]
    pub content_en: Option<String>,
    #[serde(default)]
    pub content_he: Option<String>,
    #[serde(default)]
    pub summary_en: Option<String>,
    #[serde(default)]
    pub summary_he: Option<String>,
}

impl EnrichedContent {
    /// Non-empty fields as (name, value) pairs.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("content_en", &self.content_en),
            ("content_he", &self.content_he),
            ("summary_en", &self.summary_en),
            ("summary_he", &self.summary_he),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(|v| (name, v))
        })
        .collect()
    }
}

/// Trait for story enrichment - enables mocking for tests.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, request: &EnrichRequest) -> Result<EnrichedContent>;
}

/// Enricher posting JSON to a configured endpoint.
pub struct HttpEnricher {
    client: Client,
    endpoint: String,
}

impl HttpEnricher {
    pub fn new(config: &Config, endpoint: &str) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        if let Some(proxy_url) = &config.proxy {
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build enrichment client")?;
        Ok(Self { client, endpoint: endpoint.to_string() })
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    async fn enrich(&self, request: &EnrichRequest) -> Result<EnrichedContent> {
        debug!("Enriching story: {}", request.title);

        let body = serde_json::to_string(request).context("Failed to encode enrichment request")?;
        let response = self
            .client
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .context("Failed to send enrichment request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Enrichment failed with status: {}", status);
        }

        let text = response.text().await.context("Failed to read enrichment response")?;
        serde_json::from_str(&text).context("Failed to parse enrichment response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> EnrichRequest {
        EnrichRequest {
            title: "First Ballon d'Or".to_string(),
            context: "Won in 2008.".to_string(),
            story_type: "milestone".to_string(),
            era: Some("United".to_string()),
        }
    }

    #[tokio::test]
    async fn test_enrich_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/enrich"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(serde_json::json!({"title": "First Ballon d'Or", "era": "United"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"content_en": "A long story.", "summary_en": "Short.", "content_he": ""}"#,
            ))
            .mount(&mock_server)
            .await;

        let enricher =
            HttpEnricher::new(&Config::default(), &format!("{}/enrich", mock_server.uri())).unwrap();
        let content = enricher.enrich(&request()).await.unwrap();

        assert_eq!(content.content_en.as_deref(), Some("A long story."));
        assert_eq!(content.summary_he, None);
        assert_eq!(content.fields(), vec![("content_en", "A long story."), ("summary_en", "Short.")]);
    }

    #[tokio::test]
    async fn test_enrich_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let enricher = HttpEnricher::new(&Config::default(), &mock_server.uri()).unwrap();
        let err = enricher.enrich(&request()).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_enrich_invalid_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let enricher = HttpEnricher::new(&Config::default(), &mock_server.uri()).unwrap();
        let err = enricher.enrich(&request()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse enrichment response"));
    }
}
