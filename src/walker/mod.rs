//! Source walkers
//!
//! One walker per configured source. Each iteration sleeps
//! `base_delay + random(0..=jitter)`, reads the page under the cursor, pushes
//! every entry onto the task queue and advances the cursor.
//!
//! ```text
//!   ┌─────────┐  fetch_page   ┌────────────┐  push   ┌───────────┐
//!   │ Cursor  │ ────────────▶ │ FeedSource │ ──────▶ │ TaskQueue │
//!   └─────────┘               └────────────┘         └───────────┘
//!        ▲                          │ links
//!        └──────── advance ─────────┘
//! ```
//!
//! Fetch and parse failures never stop a walker: the same page is retried on
//! the next iteration. A walker stops when the cancellation signal fires, the
//! link-relation feed has no `next` page, a query-parameter source returns
//! more than five empty pages in a row, or the queue is closed.

pub mod cursor;

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::pipeline::TaskQueue;
use crate::sources::FeedSource;

pub use cursor::{Advance, Cursor, CursorError, Exhaustion, Pagination};

/// Timing and limits of one walker
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Fixed pause before every page request
    pub base_delay: Duration,
    /// Upper bound of the random pause added to `base_delay`
    pub jitter: Duration,
    /// Stop after this many successfully read pages
    pub max_pages: Option<u64>,
    /// Consecutive empty pages tolerated by query-parameter sources
    pub exhaustion_threshold: u32,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            jitter: Duration::from_secs(10),
            max_pages: None,
            exhaustion_threshold: cursor::DEFAULT_EXHAUSTION_THRESHOLD,
        }
    }
}

/// Why a walker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Too many consecutive empty pages
    Exhausted,
    /// The feed advertised no further page
    EndOfFeed,
    /// Shutdown was requested
    Cancelled,
    /// The task queue no longer accepts entries
    QueueClosed,
    /// `max_pages` reached
    PageLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::EndOfFeed => "end_of_feed",
            Self::Cancelled => "cancelled",
            Self::QueueClosed => "queue_closed",
            Self::PageLimit => "page_limit",
        }
    }
}

/// Outcome of one walker run
#[derive(Debug, Clone)]
pub struct WalkSummary {
    pub source: String,
    /// Pages read successfully
    pub pages: u64,
    /// Entries pushed onto the queue
    pub entries: u64,
    /// Fetch, parse and cursor failures
    pub failures: u64,
    /// Cursor position when the walker stopped
    pub last_url: String,
    pub stop: StopReason,
}

/// Walks the pages of one source
pub struct SourceWalker {
    name: String,
    source: Arc<dyn FeedSource>,
    cursor: Cursor,
    exhaustion: Exhaustion,
    config: WalkerConfig,
}

impl SourceWalker {
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn FeedSource>,
        cursor: Cursor,
        config: WalkerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            cursor,
            exhaustion: Exhaustion::new(config.exhaustion_threshold),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Walk until a stop condition is met
    pub async fn run(mut self, queue: TaskQueue, mut shutdown: watch::Receiver<bool>) -> WalkSummary {
        let mut pages = 0u64;
        let mut entries = 0u64;
        let mut failures = 0u64;

        tracing::info!(
            source = %self.name,
            url = %self.cursor.current(),
            pagination = ?self.cursor.pagination(),
            "Walker started"
        );

        let stop = 'walk: loop {
            if *shutdown.borrow() {
                break StopReason::Cancelled;
            }
            if self.config.max_pages.is_some_and(|max| pages >= max) {
                break StopReason::PageLimit;
            }

            let delay = self.next_delay();
            tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => break StopReason::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }

            let url = self.cursor.current().to_string();
            let page = match self.source.fetch_page(&url).await {
                Ok(page) => page,
                Err(e) => {
                    failures += 1;
                    if e.is_transient() {
                        tracing::warn!(source = %self.name, url = %url, error = %e, "Page fetch failed, will retry");
                    } else {
                        tracing::warn!(source = %self.name, url = %url, error = %e, "Page could not be parsed, will retry");
                    }
                    continue;
                }
            };

            pages += 1;
            let count = page.entries.len();
            tracing::info!(source = %self.name, url = %url, entries = count, "Fetched page");

            for entry in page.entries {
                tokio::select! {
                    biased;
                    _ = cancelled(&mut shutdown) => break 'walk StopReason::Cancelled,
                    pushed = queue.push(entry) => {
                        if pushed.is_err() {
                            break 'walk StopReason::QueueClosed;
                        }
                    }
                }
                entries += 1;
            }

            if matches!(self.cursor.pagination(), Pagination::QueryParam { .. })
                && self.exhaustion.observe(count)
            {
                tracing::info!(
                    source = %self.name,
                    empty_pages = self.exhaustion.consecutive_empty(),
                    "Source exhausted"
                );
                break StopReason::Exhausted;
            }

            match self.cursor.advance(&page.links) {
                Ok(Advance::Finished) => break StopReason::EndOfFeed,
                Ok(Advance::Moved) => {
                    tracing::debug!(source = %self.name, next = %self.cursor.current(), "Cursor advanced");
                }
                Ok(Advance::Stay) => {}
                Err(e) => {
                    failures += 1;
                    tracing::warn!(source = %self.name, url = %url, error = %e, "Cannot advance cursor");
                }
            }
        };

        let summary = WalkSummary {
            source: self.name,
            pages,
            entries,
            failures,
            last_url: self.cursor.current().to_string(),
            stop,
        };

        tracing::info!(
            source = %summary.source,
            pages = summary.pages,
            entries = summary.entries,
            failures = summary.failures,
            stop = summary.stop.as_str(),
            "Walker finished"
        );

        summary
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = self.config.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.config.base_delay + Duration::from_millis(jitter)
    }
}

/// Resolves once the shutdown flag is `true`; never if the sender is gone
pub(crate) async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
