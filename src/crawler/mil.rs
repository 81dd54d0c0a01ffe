//! mil.ru article enrichment
//!
//! The JSON listing normally carries the full text; this crawler is used when
//! enrichment is switched on for a mil.ru source.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;

use super::{Crawler, PageFetcher};
use crate::models::Entry;
use crate::parser::selectors::{
    MIL_ARTICLE_AUTHOR, MIL_ARTICLE_BLOCK, MIL_ARTICLE_PARAGRAPHS, MIL_ARTICLE_TITLE,
};
use crate::parser::{first_text, paragraphs};
use crate::utils::error::{CrawlerError, ParseError};
use crate::utils::retry::RetryConfig;

/// Crawler for mil.ru article pages
pub struct MilCrawler {
    fetcher: Arc<PageFetcher>,
    retry: RetryConfig,
}

impl MilCrawler {
    pub fn new(fetcher: Arc<PageFetcher>) -> Self {
        Self {
            fetcher,
            retry: RetryConfig::fixed(10, 1000).with_jitter(2000),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Crawler for MilCrawler {
    fn name(&self) -> &'static str {
        "mil"
    }

    async fn enrich(&self, entry: Entry) -> Result<Entry, CrawlerError> {
        let html = self.fetcher.fetch_text_with(&entry.url, &self.retry).await?;
        Ok(parse_article(&html, entry)?)
    }
}

/// Fill `entry` from a mil.ru article page
pub fn parse_article(html: &str, mut entry: Entry) -> Result<Entry, ParseError> {
    let document = Html::parse_document(html);
    let block = document
        .select(&MIL_ARTICLE_BLOCK)
        .next()
        .ok_or(ParseError::UnknownFormat)?;

    let title = first_text(block, &MIL_ARTICLE_TITLE);
    if title.is_empty() && !entry.has_title() {
        return Err(ParseError::TitleNotFound);
    }
    if !title.is_empty() {
        entry.title = title;
    }

    entry.content = paragraphs(block, &MIL_ARTICLE_PARAGRAPHS);
    let author = first_text(block, &MIL_ARTICLE_AUTHOR);
    if !author.is_empty() {
        entry.author = author;
    }

    Ok(entry)
}
