//! IndexNow notification hook
//!
//! Announces every created or rewritten article to a search engine with a
//! single GET request: `{endpoint}?key={key}&url={article}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::Entry;
use crate::pipeline::CompletionHook;
use crate::utils::error::NotificationError;

/// IndexNow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexNowConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Search engine endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Verification key; `INDEX_NOW_KEY` overrides it
    #[serde(default)]
    pub key: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://yandex.com/indexnow".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for IndexNowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            key: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl IndexNowConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.key.trim().is_empty() {
            return Err("IndexNow key cannot be empty".to_string());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err("IndexNow endpoint must start with http:// or https://".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// What the endpoint said about a submitted URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// URL accepted
    Accepted,
    /// Key received but not verified yet
    KeyPending,
}

/// IndexNow client used as a completion hook
pub struct IndexNowHook {
    endpoint: Url,
    key: String,
    client: Client,
}

impl IndexNowHook {
    pub fn new(config: &IndexNowConfig) -> Result<Self, NotificationError> {
        config.validate().map_err(NotificationError::InvalidConfig)?;

        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| NotificationError::InvalidConfig(format!("{}: {e}", config.endpoint)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint,
            key: config.key.clone(),
            client,
        })
    }

    /// Request URL for one article
    pub fn request_url(&self, link: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.key)
            .append_pair("url", link);
        url
    }

    /// Submit one article URL
    pub async fn submit(&self, link: &str) -> Result<Submission, NotificationError> {
        let response = self.client.get(self.request_url(link)).send().await?;

        match response.status() {
            StatusCode::OK => {
                tracing::info!(url = %link, "IndexNow accepted url");
                Ok(Submission::Accepted)
            }
            StatusCode::ACCEPTED => {
                tracing::info!(url = %link, "IndexNow key awaiting verification");
                Ok(Submission::KeyPending)
            }
            status => Err(NotificationError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint: self.endpoint.to_string(),
            }),
        }
    }
}

#[async_trait]
impl CompletionHook for IndexNowHook {
    async fn on_complete(&self, entry: Option<&Entry>) -> anyhow::Result<()> {
        let Some(entry) = entry else {
            return Ok(());
        };
        self.submit(&entry.url).await?;
        Ok(())
    }
}
