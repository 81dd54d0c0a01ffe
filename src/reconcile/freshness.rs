//! Freshness policy
//!
//! Decides whether a stored fragment set is stale with respect to a freshly
//! observed feed entry. Pure and deterministic.
//!
//! Rules, first match wins:
//!
//! 1. blank stored title: stale
//! 2. blank stored body, for sources whose entries must have one: stale
//! 3. fresh entry without `updated`: fresh
//! 4. both timestamps are normalised to the source's reference zone, then
//!    - timestamp sources: stale when they differ
//!    - periodic sources: stale once `stored + window <= fresh`

use chrono::{DateTime, Duration, FixedOffset, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Entry, UpdateSignal};

/// Re-read windows for sources without a reliable update signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreshnessConfig {
    /// Window for the primary languages, in hours
    #[serde(default = "default_primary_window")]
    pub primary_window_hours: i64,

    /// Window for every other language, in hours
    #[serde(default = "default_minor_window")]
    pub minor_window_hours: i64,

    /// Languages that get the short window
    #[serde(default = "default_primary_languages")]
    pub primary_languages: Vec<String>,
}

fn default_primary_window() -> i64 {
    6
}

fn default_minor_window() -> i64 {
    24
}

fn default_primary_languages() -> Vec<String> {
    vec!["ru".to_string(), "en".to_string()]
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            primary_window_hours: default_primary_window(),
            minor_window_hours: default_minor_window(),
            primary_languages: default_primary_languages(),
        }
    }
}

/// Why a stored fragment set must be rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    BlankTitle,
    BlankContent,
    TimestampChanged,
    /// The stored copy has no `updated` timestamp to compare against
    TimestampMissing,
    WindowElapsed,
}

impl StaleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlankTitle => "blank_title",
            Self::BlankContent => "blank_content",
            Self::TimestampChanged => "timestamp_changed",
            Self::TimestampMissing => "timestamp_missing",
            Self::WindowElapsed => "window_elapsed",
        }
    }
}

/// Outcome of a freshness evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Fresh,
    Stale(StaleReason),
}

impl Verdict {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Freshness policy
#[derive(Debug, Clone)]
pub struct FreshnessPolicy {
    primary_window: Duration,
    minor_window: Duration,
    primary_languages: Vec<String>,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(&FreshnessConfig::default())
    }
}

impl FreshnessPolicy {
    pub fn new(config: &FreshnessConfig) -> Self {
        Self {
            primary_window: Duration::hours(config.primary_window_hours),
            minor_window: Duration::hours(config.minor_window_hours),
            primary_languages: config
                .primary_languages
                .iter()
                .map(|lang| lang.to_lowercase())
                .collect(),
        }
    }

    /// Re-read window for a language
    pub fn window_for(&self, language: &str) -> Duration {
        if self
            .primary_languages
            .iter()
            .any(|lang| lang.eq_ignore_ascii_case(language))
        {
            self.primary_window
        } else {
            self.minor_window
        }
    }

    /// Whether the stored head fragment must be rewritten from `fresh`
    pub fn is_stale(&self, stored: &Entry, fresh: &Entry) -> bool {
        self.evaluate(stored, fresh).is_stale()
    }

    /// Evaluate the rules against the stored head fragment (chunk 1)
    pub fn evaluate(&self, stored: &Entry, fresh: &Entry) -> Verdict {
        if !stored.has_title() {
            return Verdict::Stale(StaleReason::BlankTitle);
        }

        if !stored.has_content() && stored.source.requires_content() {
            return Verdict::Stale(StaleReason::BlankContent);
        }

        let Some(fresh_updated) = fresh.updated else {
            return Verdict::Fresh;
        };

        let offset = stored.source.reference_offset();
        let observed = normalize(fresh_updated, offset);
        let Some(stored_updated) = stored.updated.map(|ts| normalize(ts, offset)) else {
            return Verdict::Stale(StaleReason::TimestampMissing);
        };

        match stored.source.update_signal() {
            UpdateSignal::Timestamp => {
                if stored_updated != observed {
                    Verdict::Stale(StaleReason::TimestampChanged)
                } else {
                    Verdict::Fresh
                }
            }
            UpdateSignal::Periodic => {
                let window = self.window_for(&stored.language);
                if stored_updated + window <= observed {
                    Verdict::Stale(StaleReason::WindowElapsed)
                } else {
                    Verdict::Fresh
                }
            }
        }
    }
}

fn normalize(ts: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
    ts.with_timezone(&offset).trunc_subsecs(0)
}
