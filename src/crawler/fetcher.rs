//! HTTP fetcher with rate limiting and charset-aware decoding
//!
//! Every outbound request of the pipeline goes through [`PageFetcher`]:
//! - Configurable User-Agent and timeout
//! - Rate limiting with governor
//! - Automatic retry on transport errors, 429 and 5xx
//! - windows-1251 / charset label decoding
//! - Per-host request counters

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1251};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT},
    Client,
};

use crate::metrics::Metrics;
use crate::utils::error::FetchError;
use crate::utils::extract_domain;
use crate::utils::retry::{with_retry_if, RetryConfig};

/// Default User-Agent when a source does not configure one
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetcher settings
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub requests_per_second: u32,
    pub retry: RetryConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            requests_per_second: 2,
            retry: RetryConfig::fixed(3, 1000),
        }
    }
}

/// A successfully fetched document
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Shared HTTP fetcher
///
/// One instance is created per source and shared by its feed source and
/// crawler through `Arc`.
pub struct PageFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    retry: RetryConfig,

    metrics: Option<Arc<Metrics>>,
}

impl PageFetcher {
    /// Create a new fetcher
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .cookie_store(true)
            .default_headers(Self::build_headers(&config.user_agent))
            .build()?;

        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            retry: config.retry,
            metrics: None,
        })
    }

    /// Record request counters into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Retry policy applied to every request
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch raw bytes with the fetcher's own retry policy
    pub async fn fetch_raw(&self, url: &str) -> Result<Fetched, FetchError> {
        self.fetch_raw_with(url, &self.retry).await
    }

    /// Fetch raw bytes with an explicit retry policy
    ///
    /// Crawlers with their own backoff pass it here.
    pub async fn fetch_raw_with(
        &self,
        url: &str,
        retry: &RetryConfig,
    ) -> Result<Fetched, FetchError> {
        let result = with_retry_if(retry, || self.attempt(url), FetchError::is_transient).await;

        match result {
            Err(e) if e.is_transient() && retry.max_retries > 0 => {
                Err(FetchError::MaxRetriesExceeded {
                    attempts: retry.max_retries + 1,
                    last: e.to_string(),
                })
            }
            other => other,
        }
    }

    /// Fetch and decode a document as text
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let fetched = self.fetch_raw(url).await?;
        decode_bytes(&fetched.bytes, &fetched.content_type)
    }

    /// Fetch and decode a document as text with an explicit retry policy
    pub async fn fetch_text_with(
        &self,
        url: &str,
        retry: &RetryConfig,
    ) -> Result<String, FetchError> {
        let fetched = self.fetch_raw_with(url, retry).await?;
        decode_bytes(&fetched.bytes, &fetched.content_type)
    }

    async fn attempt(&self, url: &str) -> Result<Fetched, FetchError> {
        self.rate_limiter.until_ready().await;

        let host = host_of(url);
        tracing::debug!(url = %url, "Fetching URL");

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                self.record_error(&host, 0);
                if e.is_timeout() {
                    return Err(FetchError::Timeout);
                }
                if e.is_builder() {
                    return Err(FetchError::InvalidUrl(url.to_string()));
                }
                return Err(FetchError::Http(e));
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            self.record_error(&host, status);
            if status == 429 {
                return Err(FetchError::RateLimit);
            }
            return Err(FetchError::ServerError(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_default();

        let bytes = response.bytes().await.map_err(|e| {
            self.record_error(&host, 0);
            FetchError::Http(e)
        })?;

        if let Some(metrics) = &self.metrics {
            metrics.record_request_success(&host);
        }

        Ok(Fetched {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    fn record_error(&self, host: &str, status: u16) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request_error(host, status);
        }
    }

    /// Build default headers for every request
    fn build_headers(user_agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let agent = HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(USER_AGENT, agent);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        headers
    }
}

/// Determine if a status code should trigger a retry
///
/// Retry on 429 and 5xx; every other client error is final.
pub fn should_retry(status: u16) -> bool {
    FetchError::ServerError(status).is_transient()
}

/// Decode bytes to a UTF-8 string
///
/// Strategies, in order:
/// 1. charset label from the Content-Type header
/// 2. strict UTF-8
/// 3. `<meta charset>` sniffed from the first kilobyte
/// 4. windows-1251, the legacy encoding of the Russian sources
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
    if let Some(encoding) = charset_label(content_type).and_then(Encoding::for_label) {
        return decode_with(encoding, bytes);
    }

    if let Ok(text) = decode_with(UTF_8, bytes) {
        return Ok(text);
    }

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).to_lowercase();
    if let Some(encoding) = charset_label(&head).and_then(Encoding::for_label) {
        if encoding != UTF_8 {
            return decode_with(encoding, bytes);
        }
    }

    decode_with(WINDOWS_1251, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Result<String, FetchError> {
    let (cow, _encoding, had_errors) = encoding.decode(bytes);

    if had_errors {
        return Err(FetchError::Decode(format!(
            "{} decoding errors",
            encoding.name()
        )));
    }

    Ok(cow.into_owned())
}

fn charset_label(text: &str) -> Option<&[u8]> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    let rest = &text[start..];
    let rest = rest.trim_start_matches(['"', '\'']);
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(rest[..end].as_bytes())
}

fn host_of(url: &str) -> String {
    extract_domain(url).unwrap_or_else(|_| "unknown".to_string())
}
