//! HTTP fetching with browser impersonation, pacing and retries.

use crate::config::Config;
use crate::sources::catalog::{Politeness, RetryPolicy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use wreq::Client;
use wreq_util::Emulation;

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9,en-US;q=0.8",
    "en-US,en;q=0.9,de;q=0.7",
    "en-US,en;q=0.8,pt;q=0.6",
];

const PLATFORMS: &[&str] = &["\"macOS\"", "\"Windows\"", "\"Linux\""];

/// A fetched page. Any HTTP status is returned; blocking is decided by the caller.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

/// Fetch failures that never produced a response.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("fetcher is shut down")]
    Closed,
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::Transport { .. })
    }
}

/// Trait for page fetching - enables mocking for tests.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a URL and returns the response, whatever its status.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// HTTP fetcher with browser impersonation, per-source pacing and a concurrency ceiling.
pub struct HttpFetcher {
    client: Client,
    gate: Semaphore,
    rng: Mutex<StdRng>,
    delay_ms: u64,
    delay_jitter_ms: u64,
}

impl HttpFetcher {
    /// Creates a fetcher for one source.
    pub fn new(config: &Config, politeness: &Politeness) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to build HTTP client")?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        Ok(Self {
            client,
            gate: Semaphore::new(politeness.max_in_flight.max(1)),
            rng: Mutex::new(rng),
            delay_ms: politeness.delay_ms,
            delay_jitter_ms: politeness.delay_jitter_ms,
        })
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }

    /// Adds a random delay to mimic human behavior.
    async fn delay(&self) {
        if self.delay_ms == 0 && self.delay_jitter_ms == 0 {
            return;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            self.with_rng(|rng| rng.random_range(0..=self.delay_jitter_ms))
        } else {
            0
        };

        let total_delay = self.delay_ms + jitter;
        debug!("Delaying {}ms", total_delay);
        tokio::time::sleep(Duration::from_millis(total_delay)).await;
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let _permit = self.gate.acquire().await.map_err(|_| FetchError::Closed)?;
        self.delay().await;

        let (language, platform) = self.with_rng(|rng| {
            (
                ACCEPT_LANGUAGES[rng.random_range(0..ACCEPT_LANGUAGES.len())],
                PLATFORMS[rng.random_range(0..PLATFORMS.len())],
            )
        });

        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8")
            .header("Accept-Language", language)
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Sec-Ch-Ua", "\"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"")
            .header("Sec-Ch-Ua-Mobile", "?0")
            .header("Sec-Ch-Ua-Platform", platform)
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Sec-Fetch-User", "?1")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.uri().to_string();
        debug!("Response status: {} ({})", status, final_url);

        let body = response.text().await.map_err(|e| transport_error(url, e))?;
        Ok(FetchedPage { status, url: final_url, body })
    }
}

fn transport_error(url: &str, error: wreq::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Transport { url: url.to_string(), message: error.to_string() }
    }
}

/// Fetches with retries on transient statuses and transport errors.
///
/// Backoff grows linearly with the attempt number. When the budget runs out on
/// a retryable status, the last response is returned so the caller can treat
/// it as blocked.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    policy: &RetryPolicy,
) -> Result<FetchedPage, FetchError> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch(url).await {
            Ok(page) if policy.should_retry_status(page.status) && attempt < policy.retry_times => {
                warn!("HTTP {} from {} (attempt {})", page.status, url, attempt + 1);
            }
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < policy.retry_times => {
                warn!("{} (attempt {})", e, attempt + 1);
            }
            Err(e) => return Err(e),
        }

        let backoff = policy.backoff_ms * u64::from(attempt + 1);
        if backoff > 0 {
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
        attempt += 1;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_test_config() -> Config {
        Config { seed: Some(7), ..Config::default() }
    }

    fn fast() -> Politeness {
        Politeness {
            delay_ms: 0,
            delay_jitter_ms: 0,
            max_in_flight: 1,
            retry: RetryPolicy { backoff_ms: 0, ..RetryPolicy::default() },
        }
    }

    #[tokio::test]
    async fn test_fetch_returns_any_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ok"))
            .and(header_exists("Accept-Language"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&make_test_config(), &fast()).unwrap();

        let page = fetcher.fetch(&format!("{}/ok", mock_server.uri())).await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.body.contains("hello"));

        let page = fetcher.fetch(&format!("{}/denied", mock_server.uri())).await.unwrap();
        assert_eq!(page.status, 403);
    }

    #[tokio::test]
    async fn test_retry_on_transient_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&make_test_config(), &fast()).unwrap();
        let url = format!("{}/flaky", mock_server.uri());
        let page = fetch_with_retry(&fetcher, &url, &fast().retry).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.body, "recovered");
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted_returns_last_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&make_test_config(), &fast()).unwrap();
        let url = format!("{}/busy", mock_server.uri());
        let page = fetch_with_retry(&fetcher, &url, &fast().retry).await.unwrap();
        assert_eq!(page.status, 429);
    }

    #[tokio::test]
    async fn test_forbidden_is_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&make_test_config(), &fast()).unwrap();
        let url = format!("{}/denied", mock_server.uri());
        let page = fetch_with_retry(&fetcher, &url, &fast().retry).await.unwrap();
        assert_eq!(page.status, 403);
    }

    struct FailingFetcher {
        calls: AtomicU32,
        error: fn() -> FetchError,
    }

    #[async_trait]
    impl PageFetcher for FailingFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let fetcher = FailingFetcher {
            calls: AtomicU32::new(0),
            error: || FetchError::Timeout { url: "http://x".to_string() },
        };
        let err = fetch_with_retry(&fetcher, "http://x", &fast().retry).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_closed_is_not_retried() {
        let fetcher = FailingFetcher { calls: AtomicU32::new(0), error: || FetchError::Closed };
        let err = fetch_with_retry(&fetcher, "http://x", &fast().retry).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_display() {
        let err = FetchError::Timeout { url: "https://example.com".to_string() };
        assert_eq!(err.to_string(), "request to https://example.com timed out");
    }
}
