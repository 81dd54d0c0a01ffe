//! Error scenario integration tests
//!
//! Tests various failure modes and error handling:
//! 1. Network timeouts
//! 2. HTTP error responses (404, 503)
//! 3. Malformed feed pages
//! 4. Retry logic
//! 5. Unusable cursors

use std::sync::Arc;
use std::time::Duration;

use feedmill::crawler::{CrawlerRegistry, FetcherConfig, MidCrawler, PageFetcher};
use feedmill::models::{Entry, SourceKind};
use feedmill::pipeline::{execute, PipelineConfig, Task, TaskStatus, WorkerPool};
use feedmill::reconcile::{FreshnessPolicy, Reconciler};
use feedmill::sources::{MidListingSource, SyndicationSource};
use feedmill::splitter::Splitter;
use feedmill::storage::MemoryStorage;
use feedmill::utils::error::FetchError;
use feedmill::utils::retry::RetryConfig;
use feedmill::walker::{Cursor, Pagination, SourceWalker, StopReason, WalkerConfig};
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{KREMLIN_PAGE_2, MID_LISTING_EMPTY};
use crate::common::{fast_fetcher, instant_walker, RecordingHook};

fn empty_pool() -> WorkerPool {
    let reconciler = Reconciler::new(
        Arc::new(MemoryStorage::new()),
        CrawlerRegistry::new(),
        Splitter::default(),
        FreshnessPolicy::default(),
    );
    WorkerPool::new(
        PipelineConfig::default(),
        Arc::new(reconciler),
        Arc::new(feedmill::pipeline::NoopHook),
    )
}

// ============================================================================
// Network Error Tests
// ============================================================================

#[tokio::test]
async fn test_timeout_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let fetcher = PageFetcher::new(FetcherConfig {
        timeout: Duration::from_millis(200),
        requests_per_second: 100,
        retry: RetryConfig::fixed(0, 0),
        ..Default::default()
    })
    .unwrap();

    let result = fetcher.fetch_text(&format!("{}/slow", mock_server.uri())).await;
    assert!(matches!(result, Err(FetchError::Timeout)), "got {result:?}");
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let fetcher = PageFetcher::new(FetcherConfig {
        requests_per_second: 100,
        retry: RetryConfig::fixed(2, 10),
        ..Default::default()
    })
    .unwrap();

    let body = fetcher
        .fetch_text(&format!("{}/flaky", mock_server.uri()))
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = PageFetcher::new(FetcherConfig {
        requests_per_second: 100,
        retry: RetryConfig::fixed(3, 10),
        ..Default::default()
    })
    .unwrap();

    let result = fetcher
        .fetch_text(&format!("{}/missing", mock_server.uri()))
        .await;
    assert!(matches!(result, Err(FetchError::ServerError(404))), "got {result:?}");
}

// ============================================================================
// Walker Recovery Tests
// ============================================================================

#[tokio::test]
async fn test_walker_retries_page_after_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(KREMLIN_PAGE_2))
        .mount(&mock_server)
        .await;

    let pool = empty_pool();
    let queue = pool.queue();
    let handle = pool.run_background();

    let source = SyndicationSource::new(fast_fetcher(), SourceKind::Kremlin, "ru");
    let cursor = Cursor::new(format!("{}/feed", mock_server.uri()), Pagination::LinkRelation);
    let walker = SourceWalker::new("kremlin", Arc::new(source), cursor, instant_walker(None));

    let (_stop, shutdown) = watch::channel(false);
    let summary = walker.run(queue, shutdown).await;
    let stats = handle.join().await;

    assert_eq!(summary.failures, 1);
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.stop, StopReason::EndOfFeed);
    assert_eq!(stats.created, 1);
}

#[tokio::test]
async fn test_malformed_feed_until_shutdown() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Not a feed"))
        .mount(&mock_server)
        .await;

    let pool = empty_pool();
    let queue = pool.queue();
    let handle = pool.run_background();

    let source = SyndicationSource::new(fast_fetcher(), SourceKind::Kremlin, "ru");
    let cursor = Cursor::new(format!("{}/feed", mock_server.uri()), Pagination::LinkRelation);
    let config = WalkerConfig {
        base_delay: Duration::from_millis(20),
        jitter: Duration::ZERO,
        ..Default::default()
    };
    let walker = SourceWalker::new("kremlin", Arc::new(source), cursor, config);

    let (stop, shutdown) = watch::channel(false);
    let walk = tokio::spawn(walker.run(queue, shutdown));

    tokio::time::sleep(Duration::from_millis(300)).await;
    stop.send(true).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(5), walk)
        .await
        .expect("walker did not stop")
        .unwrap();
    handle.join().await;

    assert_eq!(summary.stop, StopReason::Cancelled);
    assert_eq!(summary.pages, 0);
    assert!(summary.failures >= 1);
}

#[tokio::test]
async fn test_non_numeric_cursor_keeps_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ru/foreign_policy/news/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MID_LISTING_EMPTY))
        .mount(&mock_server)
        .await;

    let pool = empty_pool();
    let queue = pool.queue();
    let handle = pool.run_background();

    let start = format!("{}/ru/foreign_policy/news/?PAGEN_1=last", mock_server.uri());
    let source = MidListingSource::new(fast_fetcher(), SourceKind::Mid, "ru");
    let cursor = Cursor::new(
        start.clone(),
        Pagination::QueryParam {
            param: "PAGEN_1".into(),
            step: 1,
        },
    );
    let walker = SourceWalker::new("mid", Arc::new(source), cursor, instant_walker(Some(3)));

    let (_stop, shutdown) = watch::channel(false);
    let summary = walker.run(queue, shutdown).await;
    handle.join().await;

    assert_eq!(summary.stop, StopReason::PageLimit);
    assert_eq!(summary.pages, 3);
    assert_eq!(summary.failures, 3);
    assert_eq!(summary.last_url, start);
}

// ============================================================================
// Task Failure Tests
// ============================================================================

#[tokio::test]
async fn test_missing_article_fails_task() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ru/foreign_policy/news/1950001/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let storage = Arc::new(MemoryStorage::new());
    let crawler = MidCrawler::new(fast_fetcher()).with_retry(RetryConfig::fixed(0, 0));
    let reconciler = Reconciler::new(
        storage.clone(),
        CrawlerRegistry::new().with(SourceKind::Mid, Arc::new(crawler)),
        Splitter::default(),
        FreshnessPolicy::default(),
    );
    let hook = RecordingHook::default();

    let entry = Entry::new(
        SourceKind::Mid,
        "ru",
        format!("{}/ru/foreign_policy/news/1950001/", mock_server.uri()),
    );
    let status = execute(1, Task::new(entry), &reconciler, &hook).await;

    assert_eq!(status, TaskStatus::Failed);
    assert!(storage.is_empty());
    assert_eq!(hook.calls(), vec![None]);
}
