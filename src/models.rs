// Core data structures for the feedmill pipeline

use chrono::{DateTime, FixedOffset, Offset, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::utils::rune_count;

/// Origin of an entry, resolved once from the configured resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// kremlin.ru Atom feeds
    Kremlin = 1,
    /// mid.ru announcement listings
    Mid = 2,
    /// mil.ru news listings
    Mil = 3,
    /// Any other RSS/Atom feed
    #[default]
    Generic = 4,
}

/// What tells the pipeline that a stored article changed upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSignal {
    /// The feed publishes a trustworthy `updated` timestamp
    Timestamp,
    /// No trustworthy signal; articles are re-read after a fixed window
    Periodic,
}

impl SourceKind {
    /// Create from a configured resource id
    pub fn from_resource_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Kremlin),
            2 => Some(Self::Mid),
            3 => Some(Self::Mil),
            4 => Some(Self::Generic),
            _ => None,
        }
    }

    /// Resource id persisted alongside every fragment
    pub fn resource_id(&self) -> u32 {
        *self as u32
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kremlin => "kremlin",
            Self::Mid => "mid",
            Self::Mil => "mil",
            Self::Generic => "generic",
        }
    }

    /// Whether feed entries already carry the full article body
    pub fn embeds_full_content(&self) -> bool {
        !matches!(self, Self::Mid)
    }

    /// Whether a blank stored body means the article must be fetched again.
    /// Kremlin entries legitimately have no body (photo and video posts).
    pub fn requires_content(&self) -> bool {
        !matches!(self, Self::Kremlin)
    }

    /// Time zone the source publishes its timestamps in
    pub fn reference_offset(&self) -> FixedOffset {
        let hours = match self {
            Self::Kremlin => 4,
            Self::Mid | Self::Mil | Self::Generic => 3,
        };
        FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// How upstream changes are detected for this source
    pub fn update_signal(&self) -> UpdateSignal {
        match self {
            Self::Mid => UpdateSignal::Periodic,
            Self::Kremlin | Self::Mil | Self::Generic => UpdateSignal::Timestamp,
        }
    }
}

impl TryFrom<u32> for SourceKind {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Self::from_resource_id(id).ok_or_else(|| Error::config(format!("unknown resource id {id}")))
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One article fragment
///
/// All stored rows sharing a URL form a fragment set ordered by `chunk`
/// (1-based, no gaps). Chunk 1 carries the title and timestamps used for
/// freshness decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Storage row id, assigned on insert
    pub id: Option<i64>,
    pub language: String,
    pub title: String,
    pub url: String,
    /// Upstream modification time as published by the source
    pub updated: Option<DateTime<Utc>>,
    pub published: Option<DateTime<Utc>>,
    /// First insertion time; copied forward on every rewrite
    pub created: Option<DateTime<Utc>>,
    /// Last write time
    pub updated_at: Option<DateTime<Utc>>,
    pub summary: String,
    /// Body in lightweight paragraph markup
    pub content: String,
    pub author: String,
    /// Free-text document number (mid.ru publishes one)
    pub number: String,
    pub source: SourceKind,
    /// 1-based fragment index
    pub chunk: u32,
}

impl Entry {
    /// Create a raw entry as observed in a feed
    pub fn new(source: SourceKind, language: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source,
            language: language.into(),
            url: url.into(),
            chunk: 1,
            ..Default::default()
        }
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Body size in runes
    pub fn content_len(&self) -> usize {
        rune_count(&self.content)
    }
}

/// Current time truncated to whole seconds, the precision storage keeps
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
