//! Configuration management for feedmill
//!
//! Configuration is read from a TOML file given by `--config` or the
//! `CONFIG_PATH` environment variable, then a few environment variables
//! override individual values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::crawler::FetcherConfig;
use crate::error::Error;
use crate::models::SourceKind;
use crate::notifications::IndexNowConfig;
use crate::pipeline::PipelineConfig;
use crate::reconcile::FreshnessConfig;
use crate::sources::SourceFormat;
use crate::utils::retry::RetryConfig;
use crate::walker::cursor::DEFAULT_EXHAUSTION_THRESHOLD;
use crate::walker::{Pagination, WalkerConfig};

/// Environment variable holding the config file path
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,

    /// Worker pool configuration
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Fragment sizes
    #[serde(default)]
    pub splitter: SplitterConfig,

    /// HTTP defaults shared by walkers and enrichment crawlers
    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub index_now: IndexNowConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub freshness: FreshnessConfig,

    /// Feeds to walk
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment label, logged at startup
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
        }
    }
}

/// `[pipeline]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Heartbeat log interval; 0 disables it
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// Delete trailing fragments when a rewritten article got shorter
    #[serde(default)]
    pub prune_orphans: bool,
}

fn default_workers() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_heartbeat() -> u64 {
    10
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            heartbeat_secs: default_heartbeat(),
            prune_orphans: false,
        }
    }
}

impl PipelineSection {
    pub fn pool_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            heartbeat: Duration::from_secs(self.heartbeat_secs),
        }
    }
}

/// `[splitter]` section, sizes in runes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitterConfig {
    #[serde(default = "default_optimal_size")]
    pub optimal_size: usize,

    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

fn default_optimal_size() -> usize {
    1800
}

fn default_max_size() -> usize {
    3600
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            optimal_size: default_optimal_size(),
            max_size: default_max_size(),
        }
    }
}

/// `[crawler]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Requests per second per fetcher
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,

    /// Retries after a failed first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Pause before every page request
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,

    /// Upper bound of the random pause added to `base_delay_secs`
    #[serde(default = "default_jitter")]
    pub jitter_secs: u64,
}

fn default_user_agent() -> String {
    crate::crawler::fetcher::DEFAULT_USER_AGENT.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_rps() -> u32 {
    2
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_base_delay() -> u64 {
    60
}

fn default_jitter() -> u64 {
    150
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout(),
            requests_per_second: default_rps(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            base_delay_secs: default_base_delay(),
            jitter_secs: default_jitter(),
        }
    }
}

impl CrawlerConfig {
    /// Fetcher settings for enrichment crawlers
    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            requests_per_second: self.requests_per_second,
            retry: RetryConfig::fixed(self.max_retries, self.retry_delay_ms),
        }
    }
}

/// `[storage]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; `:memory:` keeps everything in process memory
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/feedmill.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
        }
    }
}

impl StorageConfig {
    pub fn is_memory(&self) -> bool {
        self.sqlite_path.as_os_str() == ":memory:"
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
        }
    }
}

/// `[metrics]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address of the `/metrics` endpoint, e.g. `0.0.0.0:9100`
    #[serde(default)]
    pub listen: Option<String>,
}

/// One `[[sources]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name used in logs; defaults to the URL host
    #[serde(default)]
    pub name: Option<String>,

    /// First page to request
    pub url: String,

    pub lang: String,

    /// 1 kremlin, 2 mid, 3 mil, 4 generic feed
    pub resource_id: u32,

    #[serde(default)]
    pub pagination: Pagination,

    /// Page format; derived from the resource id when omitted
    #[serde(default)]
    pub format: Option<SourceFormat>,

    /// Fetch the article page for entries of this source; by default only
    /// for sources whose listings lack the article body
    #[serde(default)]
    pub enrich: Option<bool>,

    #[serde(default)]
    pub max_pages: Option<u64>,

    #[serde(default)]
    pub base_delay_secs: Option<u64>,

    #[serde(default)]
    pub jitter_secs: Option<u64>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default)]
    pub retry_delay_ms: Option<u64>,

    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>, lang: impl Into<String>, resource_id: u32) -> Self {
        Self {
            name: None,
            url: url.into(),
            lang: lang.into(),
            resource_id,
            pagination: Pagination::default(),
            format: None,
            enrich: None,
            max_pages: None,
            base_delay_secs: None,
            jitter_secs: None,
            user_agent: None,
            max_retries: None,
            retry_delay_ms: None,
            requests_per_second: None,
        }
    }

    pub fn kind(&self) -> Result<SourceKind, Error> {
        SourceKind::try_from(self.resource_id)
    }

    pub fn format(&self) -> Result<SourceFormat, Error> {
        match self.format {
            Some(format) => Ok(format),
            None => Ok(SourceFormat::default_for(self.kind()?)),
        }
    }

    pub fn enrichment_enabled(&self) -> Result<bool, Error> {
        let kind = self.kind()?;
        Ok(self.enrich.unwrap_or(!kind.embeds_full_content()))
    }

    /// Display name: configured name, else `host/lang`
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match crate::utils::extract_domain(&self.url) {
            Ok(host) => format!("{host}/{}", self.lang),
            Err(_) => self.url.clone(),
        }
    }

    /// Fetcher settings with this source's overrides applied
    pub fn fetcher_config(&self, defaults: &CrawlerConfig) -> FetcherConfig {
        FetcherConfig {
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| defaults.user_agent.clone()),
            timeout: Duration::from_secs(defaults.request_timeout_secs),
            requests_per_second: self
                .requests_per_second
                .unwrap_or(defaults.requests_per_second),
            retry: RetryConfig::fixed(
                self.max_retries.unwrap_or(defaults.max_retries),
                self.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            ),
        }
    }

    /// Walker timing with this source's overrides applied
    pub fn walker_config(&self, defaults: &CrawlerConfig) -> WalkerConfig {
        WalkerConfig {
            base_delay: Duration::from_secs(self.base_delay_secs.unwrap_or(defaults.base_delay_secs)),
            jitter: Duration::from_secs(self.jitter_secs.unwrap_or(defaults.jitter_secs)),
            max_pages: self.max_pages,
            exhaustion_threshold: DEFAULT_EXHAUSTION_THRESHOLD,
        }
    }
}

impl Config {
    /// Load from `path`, or from `CONFIG_PATH` when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .with_context(|| {
                    format!("No config file given: pass --config or set {CONFIG_PATH_ENV}")
                })?,
        };

        let mut config = Self::from_file(&path)?;
        config.apply_env();
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `FEEDMILL_LOG_LEVEL`, `FEEDMILL_WORKERS` and `INDEX_NOW_KEY`
    pub fn apply_env(&mut self) {
        if let Ok(level) = std::env::var("FEEDMILL_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }

        if let Some(workers) = std::env::var("FEEDMILL_WORKERS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.pipeline.workers = workers;
        }

        if let Ok(key) = std::env::var("INDEX_NOW_KEY") {
            if !key.trim().is_empty() {
                self.index_now.key = key;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Error> {
        if self.pipeline.workers == 0 {
            return Err(Error::config("workers must be greater than 0"));
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be greater than 0"));
        }

        if self.splitter.optimal_size == 0 || self.splitter.max_size == 0 {
            return Err(Error::config("fragment sizes must be greater than 0"));
        }

        if self.splitter.optimal_size > self.splitter.max_size {
            return Err(Error::config(format!(
                "optimal_size {} exceeds max_size {}",
                self.splitter.optimal_size, self.splitter.max_size
            )));
        }

        if self.crawler.requests_per_second == 0 {
            return Err(Error::config("requests_per_second must be greater than 0"));
        }

        if self.sources.is_empty() {
            return Err(Error::config("no sources configured"));
        }

        for source in &self.sources {
            source.kind()?;

            if url::Url::parse(&source.url).is_err() {
                return Err(Error::config(format!("invalid source url {}", source.url)));
            }

            if source.lang.trim().is_empty() {
                return Err(Error::config(format!("source {} has no language", source.url)));
            }

            if let Pagination::QueryParam { param, .. } = &source.pagination {
                if param.trim().is_empty() {
                    return Err(Error::config(format!(
                        "source {} uses query pagination without a parameter",
                        source.url
                    )));
                }
            }

            if source.requests_per_second == Some(0) {
                return Err(Error::config(format!(
                    "source {} has requests_per_second = 0",
                    source.url
                )));
            }
        }

        if let Some(listen) = &self.metrics.listen {
            listen
                .parse::<std::net::SocketAddr>()
                .map_err(|e| Error::config(format!("invalid metrics listen address {listen}: {e}")))?;
        }

        self.index_now.validate().map_err(Error::config)?;

        Ok(())
    }
}
