//! Feed sources
//!
//! A [`FeedSource`] turns one listing page into raw entries plus the
//! navigation links the page advertises. Three formats are supported:
//!
//! | Format | Implementation | Used for |
//! |---|---|---|
//! | `feed` | [`SyndicationSource`] | kremlin.ru Atom, mid.ru RSS, any RSS/Atom |
//! | `mid_listing` | [`MidListingSource`] | mid.ru paginated announce lists |
//! | `mil_json` | [`MilNewsSource`] | mil.ru JSON news listing |

pub mod feed;
pub mod mid;
pub mod mil;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crawler::PageFetcher;
use crate::models::{Entry, SourceKind};
use crate::utils::error::SourceError;

pub use feed::SyndicationSource;
pub use mid::MidListingSource;
pub use mil::MilNewsSource;

/// Listing page format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Feed,
    MidListing,
    MilJson,
}

impl SourceFormat {
    /// Format used when a source does not configure one
    pub fn default_for(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Mil => Self::MilJson,
            SourceKind::Kremlin | SourceKind::Mid | SourceKind::Generic => Self::Feed,
        }
    }
}

/// Navigation links advertised by a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub self_link: Option<String>,
    pub next: Option<String>,
    pub prev: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
}

impl PageLinks {
    /// Record `href` under the relation `rel`; unknown relations are ignored
    pub fn set(&mut self, rel: &str, href: impl Into<String>) {
        let slot = match rel.to_ascii_lowercase().as_str() {
            "self" => &mut self.self_link,
            "next" => &mut self.next,
            "prev" | "previous" => &mut self.prev,
            "first" => &mut self.first,
            "last" => &mut self.last,
            _ => return,
        };
        *slot = Some(href.into());
    }

    /// The `next` link, treating an empty string as absent
    pub fn next_link(&self) -> Option<&str> {
        self.next
            .as_deref()
            .map(str::trim)
            .filter(|href| !href.is_empty())
    }
}

/// One fetched listing page
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub entries: Vec<Entry>,
    pub links: PageLinks,
}

/// Reads listing pages of one source
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the page at `url`
    async fn fetch_page(&self, url: &str) -> Result<FeedPage, SourceError>;
}

/// Build the feed source for a configured format
pub fn build_source(
    format: SourceFormat,
    kind: SourceKind,
    language: &str,
    fetcher: Arc<PageFetcher>,
) -> Arc<dyn FeedSource> {
    match format {
        SourceFormat::Feed => Arc::new(SyndicationSource::new(fetcher, kind, language)),
        SourceFormat::MidListing => Arc::new(MidListingSource::new(fetcher, kind, language)),
        SourceFormat::MilJson => Arc::new(MilNewsSource::new(fetcher, kind, language)),
    }
}
