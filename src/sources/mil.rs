//! mil.ru JSON news source
//!
//! The news endpoint answers `{"data": [{id, title, text, link, date,
//! preview}, ...]}` with the full article HTML in `text`. Pagination is an
//! item offset query parameter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{FeedPage, FeedSource, PageLinks};
use crate::crawler::PageFetcher;
use crate::models::{Entry, SourceKind};
use crate::parser::sanitize::{clean_paragraph_html, decode_entities};
use crate::utils::error::{ParseError, SourceError};

/// Author attributed to every mil.ru article
pub const MIL_AUTHOR: &str = "Министерство обороны Российской Федерации";

const ARTICLE_URL_PREFIX: &str = "https://mil.ru/news/";

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    data: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    preview: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// mil.ru JSON listing source
pub struct MilNewsSource {
    fetcher: Arc<PageFetcher>,
    kind: SourceKind,
    language: String,
}

impl MilNewsSource {
    pub fn new(fetcher: Arc<PageFetcher>, kind: SourceKind, language: &str) -> Self {
        Self {
            fetcher,
            kind,
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl FeedSource for MilNewsSource {
    async fn fetch_page(&self, url: &str) -> Result<FeedPage, SourceError> {
        let fetched = self.fetcher.fetch_raw(url).await?;
        let entries = parse_news(&fetched.bytes, self.kind, &self.language)?;
        tracing::debug!(url = %url, entries = entries.len(), "Parsed mil.ru news page");
        Ok(FeedPage {
            entries,
            links: PageLinks::default(),
        })
    }
}

/// Parse one JSON news page
pub fn parse_news(body: &[u8], kind: SourceKind, language: &str) -> Result<Vec<Entry>, ParseError> {
    let response: NewsResponse =
        serde_json::from_slice(body).map_err(|e| ParseError::MalformedFeed(e.to_string()))?;

    let entries = response
        .data
        .into_iter()
        .filter(|item| !item.id.trim().is_empty())
        .map(|item| {
            let mut entry = Entry::new(
                kind,
                language,
                format!("{ARTICLE_URL_PREFIX}{}", item.id.trim()),
            );
            entry.title = decode_entities(item.title.trim());
            entry.content = clean_paragraph_html(&item.text);
            entry.summary = item.preview;
            entry.author = MIL_AUTHOR.to_string();
            entry.published = parse_date(&item.date);
            if entry.published.is_none() && !item.date.is_empty() {
                tracing::warn!(url = %entry.url, date = %item.date, "Cannot parse mil.ru date");
            }
            entry
        })
        .collect();

    Ok(entries)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
