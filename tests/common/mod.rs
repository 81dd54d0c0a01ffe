//! Common test utilities

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedmill::crawler::{FetcherConfig, PageFetcher};
use feedmill::models::{Entry, SourceKind};
use feedmill::pipeline::CompletionHook;
use feedmill::utils::retry::RetryConfig;
use feedmill::walker::WalkerConfig;

/// Fetcher without retries or meaningful rate limiting
pub fn fast_fetcher() -> Arc<PageFetcher> {
    Arc::new(
        PageFetcher::new(FetcherConfig {
            timeout: Duration::from_secs(5),
            requests_per_second: 1000,
            retry: RetryConfig::fixed(0, 0),
            ..Default::default()
        })
        .unwrap(),
    )
}

/// Walker that never sleeps between pages
#[allow(dead_code)]
pub fn instant_walker(max_pages: Option<u64>) -> WalkerConfig {
    WalkerConfig {
        base_delay: Duration::ZERO,
        jitter: Duration::ZERO,
        max_pages,
        ..Default::default()
    }
}

/// `count` paragraphs of `runes` runes each, markup included
pub fn paragraph_body(count: usize, runes: usize) -> String {
    let text = "ф".repeat(runes.saturating_sub(7));
    (0..count).map(|_| format!("<p>{text}</p>")).collect()
}

/// Raw entry as a feed would deliver it
#[allow(dead_code)]
pub fn create_test_entry(
    source: SourceKind,
    url: &str,
    updated: Option<DateTime<Utc>>,
    content: String,
) -> Entry {
    let mut entry = Entry::new(source, "ru", url);
    entry.title = "Тестовая новость".to_string();
    entry.content = content;
    entry.updated = updated;
    entry
}

/// Hook remembering what it was called with
#[derive(Default)]
pub struct RecordingHook {
    calls: Mutex<Vec<Option<Entry>>>,
}

#[allow(dead_code)]
impl RecordingHook {
    pub fn calls(&self) -> Vec<Option<Entry>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn written(&self) -> Vec<Entry> {
        self.calls().into_iter().flatten().collect()
    }
}

#[async_trait]
impl CompletionHook for RecordingHook {
    async fn on_complete(&self, entry: Option<&Entry>) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(entry.cloned());
        Ok(())
    }
}
