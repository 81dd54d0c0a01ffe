//! Article enrichment
//!
//! Some sources list articles without their body. A [`Crawler`] fetches the
//! article page and fills in title, content and source-specific fields. The
//! [`CrawlerRegistry`] maps each [`SourceKind`] to at most one crawler; it is
//! assembled once at startup from configuration.

pub mod fetcher;
pub mod mid;
pub mod mil;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Entry, SourceKind};
use crate::utils::error::CrawlerError;

pub use fetcher::{FetcherConfig, PageFetcher};
pub use mid::MidCrawler;
pub use mil::MilCrawler;

/// Per-source full-page fetch
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetch the article page for `entry.url` and return the enriched entry.
    ///
    /// Retries are bounded by the implementation; an error means the task
    /// must be abandoned without writes.
    async fn enrich(&self, entry: Entry) -> Result<Entry, CrawlerError>;
}

/// Crawler lookup by source
#[derive(Default, Clone)]
pub struct CrawlerRegistry {
    crawlers: HashMap<SourceKind, Arc<dyn Crawler>>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `crawler` for `kind`, replacing any previous one
    pub fn register(&mut self, kind: SourceKind, crawler: Arc<dyn Crawler>) {
        tracing::debug!(source = %kind, crawler = crawler.name(), "Registered crawler");
        self.crawlers.insert(kind, crawler);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, kind: SourceKind, crawler: Arc<dyn Crawler>) -> Self {
        self.register(kind, crawler);
        self
    }

    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn Crawler>> {
        self.crawlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.crawlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crawlers.is_empty()
    }
}

/// Default crawler for a source kind, if the kind needs one
pub fn crawler_for(kind: SourceKind, fetcher: Arc<PageFetcher>) -> Option<Arc<dyn Crawler>> {
    match kind {
        SourceKind::Mid => Some(Arc::new(MidCrawler::new(fetcher))),
        SourceKind::Mil => Some(Arc::new(MilCrawler::new(fetcher))),
        SourceKind::Kremlin | SourceKind::Generic => None,
    }
}
