//! mid.ru announce list source
//!
//! Listing pages are paginated with `PAGEN_1` and hold one
//! `li.announce__item` per article: a link, the title as link text, and the
//! publication date split over two spans (`15.05.2024` and `12:00`, Moscow
//! time). The listing carries no modification time, so `updated` stays unset
//! and stored articles are only re-read when they lack a title or body.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use scraper::Html;
use url::Url;

use super::{FeedPage, FeedSource, PageLinks};
use crate::crawler::PageFetcher;
use crate::models::{Entry, SourceKind};
use crate::parser::selectors::{LINK, MID_LIST, MID_LIST_DATE, MID_LIST_ITEM, MID_LIST_TIME};
use crate::parser::{element_text, first_text};
use crate::utils::error::{ParseError, SourceError};

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

/// mid.ru announce list source
pub struct MidListingSource {
    fetcher: Arc<PageFetcher>,
    kind: SourceKind,
    language: String,
}

impl MidListingSource {
    pub fn new(fetcher: Arc<PageFetcher>, kind: SourceKind, language: &str) -> Self {
        Self {
            fetcher,
            kind,
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl FeedSource for MidListingSource {
    async fn fetch_page(&self, url: &str) -> Result<FeedPage, SourceError> {
        let html = self.fetcher.fetch_text(url).await?;
        let entries = parse_listing(&html, url, self.kind, &self.language)?;
        tracing::debug!(url = %url, entries = entries.len(), "Parsed mid.ru listing page");
        Ok(FeedPage {
            entries,
            links: PageLinks::default(),
        })
    }
}

/// Parse one listing page fetched from `page_url`
///
/// A page without the announce list is an empty page, not an error: past the
/// last page mid.ru renders the layout without articles.
pub fn parse_listing(
    html: &str,
    page_url: &str,
    kind: SourceKind,
    language: &str,
) -> Result<Vec<Entry>, ParseError> {
    let base = Url::parse(page_url).map_err(|e| ParseError::InvalidUrl(e.to_string()))?;
    let document = Html::parse_document(html);
    let mut entries = Vec::new();

    for list in document.select(&MID_LIST) {
        for item in list.select(&MID_LIST_ITEM) {
            let Some(link) = item.select(&LINK).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href").map(str::trim) else {
                continue;
            };
            let Ok(url) = base.join(href) else {
                tracing::warn!(href = %href, "Unresolvable mid.ru link, skipped");
                continue;
            };

            let mut entry = Entry::new(kind, language, url.to_string());
            entry.title = element_text(link);

            let date = first_text(item, &MID_LIST_DATE);
            let time = first_text(item, &MID_LIST_TIME);
            entry.published = parse_listing_date(&date, &time, kind);
            if entry.published.is_none() {
                tracing::warn!(url = %entry.url, date = %date, time = %time, "Cannot parse mid.ru date");
            }

            entries.push(entry);
        }
    }

    Ok(entries)
}

/// Parse `dd.mm.yyyy` + `HH:MM` in the source's reference zone
pub fn parse_listing_date(date: &str, time: &str, kind: SourceKind) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(&format!("{date} {time}"), DATE_FORMAT).ok()?;
    kind.reference_offset()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
