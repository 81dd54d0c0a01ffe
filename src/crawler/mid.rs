//! mid.ru article enrichment
//!
//! Listing pages only carry title, link and date. The article page comes in
//! one of two layouts:
//!
//! - photo article: `div.photo-content`
//! - announcement: `ul.announcements`
//!
//! mid.ru drops connections under load, so page fetches back off linearly
//! (10 s, 20 s, 30 s, ...) for up to ten retries.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{Crawler, PageFetcher};
use crate::models::Entry;
use crate::parser::selectors::{
    MID_ANNOUNCEMENT_BLOCK, MID_ANNOUNCEMENT_NUMBER, MID_ANNOUNCEMENT_PARAGRAPHS,
    MID_ANNOUNCEMENT_TITLE, MID_ARTICLE_BLOCK, MID_ARTICLE_NUMBER, MID_ARTICLE_PARAGRAPHS,
    MID_ARTICLE_TITLE,
};
use crate::parser::{first_text, paragraphs};
use crate::utils::error::{CrawlerError, ParseError};
use crate::utils::retry::RetryConfig;

/// Crawler for mid.ru article pages
pub struct MidCrawler {
    fetcher: Arc<PageFetcher>,
    retry: RetryConfig,
}

impl MidCrawler {
    pub fn new(fetcher: Arc<PageFetcher>) -> Self {
        Self {
            fetcher,
            retry: RetryConfig::linear(10, 10_000, 120_000),
        }
    }

    /// Override the page retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Crawler for MidCrawler {
    fn name(&self) -> &'static str {
        "mid"
    }

    async fn enrich(&self, entry: Entry) -> Result<Entry, CrawlerError> {
        tracing::debug!(url = %entry.url, "Crawling mid.ru article");
        let html = self.fetcher.fetch_text_with(&entry.url, &self.retry).await?;
        let enriched = parse_article(&html, entry)?;
        tracing::debug!(
            url = %enriched.url,
            title = %enriched.title,
            runes = enriched.content_len(),
            "mid.ru article parsed"
        );
        Ok(enriched)
    }
}

struct Layout {
    block: &'static Selector,
    title: &'static Selector,
    number: &'static Selector,
    paragraphs: &'static Selector,
}

/// Fill `entry` from an article page
pub fn parse_article(html: &str, mut entry: Entry) -> Result<Entry, ParseError> {
    let layouts = [
        Layout {
            block: &MID_ARTICLE_BLOCK,
            title: &MID_ARTICLE_TITLE,
            number: &MID_ARTICLE_NUMBER,
            paragraphs: &MID_ARTICLE_PARAGRAPHS,
        },
        Layout {
            block: &MID_ANNOUNCEMENT_BLOCK,
            title: &MID_ANNOUNCEMENT_TITLE,
            number: &MID_ANNOUNCEMENT_NUMBER,
            paragraphs: &MID_ANNOUNCEMENT_PARAGRAPHS,
        },
    ];

    let document = Html::parse_document(html);

    let (block, layout): (ElementRef<'_>, &Layout) = layouts
        .iter()
        .find_map(|layout| document.select(layout.block).next().map(|b| (b, layout)))
        .ok_or(ParseError::UnknownFormat)?;

    let title = first_text(block, layout.title);
    if !title.is_empty() {
        entry.title = title;
    }
    entry.number = first_text(block, layout.number);
    entry.content = paragraphs(block, layout.paragraphs);

    Ok(entry)
}
