//! End-to-end pipeline integration tests
//!
//! Tests the complete workflow:
//! 1. Feed page fetch (mocked)
//! 2. Task queue and worker pool
//! 3. Enrichment, freshness decision and splitting
//! 4. Fragment storage
//! 5. Completion hook and statistics

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use feedmill::app::{self, RunOptions};
use feedmill::config::{Config, SourceConfig};
use feedmill::crawler::{CrawlerRegistry, MidCrawler};
use feedmill::metrics::Metrics;
use feedmill::models::{Entry, SourceKind};
use feedmill::pipeline::{NoopHook, PipelineConfig, WorkerPool};
use feedmill::reconcile::{FreshnessPolicy, ReconcileOutcome, Reconciler, StaleReason};
use feedmill::sources::MidListingSource;
use feedmill::splitter::{join_fragments, Splitter};
use feedmill::storage::{EntryStorage, MemoryStorage, SqliteStorage};
use feedmill::utils::retry::RetryConfig;
use feedmill::walker::{Cursor, Pagination, SourceWalker, StopReason};
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{
    mid_article, KREMLIN_PAGE_1, KREMLIN_PAGE_2, MID_LISTING, MID_LISTING_EMPTY,
};
use crate::common::{
    create_test_entry, fast_fetcher, instant_walker, paragraph_body, RecordingHook,
};

fn reconciler(storage: Arc<MemoryStorage>, crawlers: CrawlerRegistry) -> Reconciler {
    Reconciler::new(
        storage,
        crawlers,
        Splitter::new(1800, 3600),
        FreshnessPolicy::default(),
    )
}

// ============================================================================
// Reconciliation Scenarios
// ============================================================================

#[tokio::test]
async fn test_new_long_article_is_split_and_announced() {
    let storage = Arc::new(MemoryStorage::new());
    let hook = Arc::new(RecordingHook::default());
    let pool = WorkerPool::new(
        PipelineConfig::default(),
        Arc::new(reconciler(Arc::clone(&storage), CrawlerRegistry::new())),
        hook.clone(),
    );
    let queue = pool.queue();
    let handle = pool.run_background();

    let url = "http://kremlin.ru/events/president/news/80000";
    let body = paragraph_body(10, 500);
    let updated = Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap();
    queue
        .push(create_test_entry(SourceKind::Kremlin, url, Some(updated), body.clone()))
        .await
        .unwrap();
    drop(queue);

    let stats = handle.join().await;
    assert_eq!(stats.created, 1);

    let fragments = storage.find_fragments_by_url(url).await.unwrap();
    assert!(fragments.len() >= 2, "expected several fragments, got {}", fragments.len());
    for (index, fragment) in fragments.iter().enumerate() {
        assert_eq!(fragment.chunk as usize, index + 1);
        assert!(fragment.content_len() <= 3600);
        assert!(fragment.created.is_some());
        assert_eq!(fragment.updated, Some(updated));
    }
    let contents: Vec<&str> = fragments.iter().map(|f| f.content.as_str()).collect();
    assert_eq!(join_fragments(&contents), body);

    let written = hook.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].url, url);
}

#[tokio::test]
async fn test_blank_stored_title_forces_reenrichment() {
    let server = MockServer::start().await;
    let article_path = "/ru/foreign_policy/news/1950000/";
    Mock::given(method("GET"))
        .and(path(article_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(mid_article("Брифинг официального представителя", 10)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}{}", server.uri(), article_path);
    let updated = Utc.with_ymd_and_hms(2024, 5, 15, 9, 0, 0).unwrap();
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

    let storage = Arc::new(MemoryStorage::new());
    for chunk in 1..=2 {
        let mut stored = create_test_entry(SourceKind::Mid, &url, Some(updated), "<p>old</p>".into());
        stored.title = String::new();
        stored.chunk = chunk;
        stored.created = Some(created);
        storage.insert(&stored).await.unwrap();
    }
    let before = storage.find_fragments_by_url(&url).await.unwrap();

    let crawler = MidCrawler::new(fast_fetcher()).with_retry(RetryConfig::fixed(0, 0));
    let registry = CrawlerRegistry::new().with(SourceKind::Mid, Arc::new(crawler));
    let rec = reconciler(Arc::clone(&storage), registry);

    let mut observed = Entry::new(SourceKind::Mid, "ru", url.clone());
    observed.updated = Some(updated);
    let outcome = rec.reconcile(observed).await.unwrap();

    let ReconcileOutcome::Updated {
        reason, updated: rewritten, ..
    } = outcome
    else {
        panic!("expected an update, got {outcome:?}");
    };
    assert_eq!(reason, StaleReason::BlankTitle);
    assert_eq!(rewritten, 2);

    let after = storage.find_fragments_by_url(&url).await.unwrap();
    assert!(after.len() >= 2);
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.id, new.id);
        assert_eq!(new.created, Some(created));
        assert_eq!(new.title, "Брифинг официального представителя");
        assert_eq!(new.number, "1001-15-05-2024");
        assert!(new.has_content());
    }
}

#[tokio::test]
async fn test_periodic_source_window() {
    let storage = Arc::new(MemoryStorage::new());
    let rec = reconciler(Arc::clone(&storage), CrawlerRegistry::new());

    let url = "https://mid.ru/ru/foreign_policy/news/1940000/";
    let stored_at = Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap();
    storage
        .insert(&create_test_entry(SourceKind::Mid, url, Some(stored_at), "<p>Текст</p>".into()))
        .await
        .unwrap();

    let five_hours = create_test_entry(
        SourceKind::Mid,
        url,
        Some(stored_at + ChronoDuration::hours(5)),
        "<p>Текст</p>".into(),
    );
    assert_eq!(rec.reconcile(five_hours).await.unwrap(), ReconcileOutcome::Unchanged);

    let past_window = create_test_entry(
        SourceKind::Mid,
        url,
        Some(stored_at + ChronoDuration::hours(6) + ChronoDuration::seconds(1)),
        "<p>Новый текст</p>".into(),
    );
    match rec.reconcile(past_window).await.unwrap() {
        ReconcileOutcome::Updated { reason, .. } => assert_eq!(reason, StaleReason::WindowElapsed),
        other => panic!("expected an update, got {other:?}"),
    }
    assert_eq!(storage.all()[0].content, "<p>Новый текст</p>");
}

// ============================================================================
// Walker Tests
// ============================================================================

async fn walk_mid_listing(server: &MockServer, start_page: u32) -> feedmill::walker::WalkSummary {
    let pool = WorkerPool::new(
        PipelineConfig::default(),
        Arc::new(reconciler(Arc::new(MemoryStorage::new()), CrawlerRegistry::new())),
        Arc::new(NoopHook),
    );
    let queue = pool.queue();
    let handle = pool.run_background();

    let source = MidListingSource::new(fast_fetcher(), SourceKind::Mid, "ru");
    let cursor = Cursor::new(
        format!("{}/ru/foreign_policy/news/?PAGEN_1={start_page}", server.uri()),
        Pagination::QueryParam {
            param: "PAGEN_1".into(),
            step: 1,
        },
    );
    let walker = SourceWalker::new("mid", Arc::new(source), cursor, instant_walker(None));

    let (_stop, shutdown) = watch::channel(false);
    let summary = walker.run(queue, shutdown).await;
    handle.join().await;
    summary
}

#[tokio::test]
async fn test_query_walker_stops_after_six_empty_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ru/foreign_policy/news/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MID_LISTING_EMPTY))
        .mount(&server)
        .await;

    let summary = walk_mid_listing(&server, 1).await;

    assert_eq!(summary.stop, StopReason::Exhausted);
    assert_eq!(summary.pages, 6);
    assert_eq!(summary.entries, 0);
    assert!(summary.last_url.ends_with("PAGEN_1=6"));
}

#[tokio::test]
async fn test_exhaustion_counter_resets_on_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ru/foreign_policy/news/"))
        .and(query_param("PAGEN_1", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MID_LISTING))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ru/foreign_policy/news/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MID_LISTING_EMPTY))
        .mount(&server)
        .await;

    let summary = walk_mid_listing(&server, 1).await;

    assert_eq!(summary.stop, StopReason::Exhausted);
    assert_eq!(summary.pages, 10);
    assert_eq!(summary.entries, 2);
}

// ============================================================================
// Complete Run Tests
// ============================================================================

fn kremlin_config(server: &MockServer, db: &std::path::Path) -> Config {
    let mut source = SourceConfig::new(format!("{}/feed", server.uri()), "ru", 1);
    source.pagination = Pagination::LinkRelation;
    source.base_delay_secs = Some(0);
    source.jitter_secs = Some(0);
    source.requests_per_second = Some(100);

    let mut config = Config::default();
    config.sources.push(source);
    config.storage.sqlite_path = db.to_path_buf();
    config.pipeline.workers = 2;
    config
}

async fn mount_kremlin_feed(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(KREMLIN_PAGE_2))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(KREMLIN_PAGE_1))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_run_follows_links_until_end_of_feed() {
    let server = MockServer::start().await;
    mount_kremlin_feed(&server).await;

    let temp_dir = TempDir::new().unwrap();
    let config = kremlin_config(&server, &temp_dir.path().join("feed.db"));
    config.validate().unwrap();

    let storage = Arc::new(SqliteStorage::open(&config.storage.sqlite_path).unwrap());
    let metrics = Arc::new(Metrics::new().unwrap());
    let (_stop, shutdown) = watch::channel(false);

    let report = app::run(
        &config,
        storage.clone(),
        Arc::clone(&metrics),
        RunOptions::default(),
        shutdown.clone(),
    )
    .await
    .unwrap();

    assert_eq!(report.walks.len(), 1);
    assert_eq!(report.walks[0].stop, StopReason::EndOfFeed);
    assert_eq!(report.walks[0].pages, 2);
    assert_eq!(report.walks[0].entries, 3);
    assert_eq!(report.stats.created, 3);
    assert_eq!(storage.count().unwrap(), 3);

    let head = storage
        .find_fragments_by_url("http://kremlin.ru/events/president/news/74001")
        .await
        .unwrap();
    assert_eq!(head.len(), 1);
    assert_eq!(head[0].title, "Совещание с членами Правительства");
    assert_eq!(
        head[0].updated,
        Some(Utc.with_ymd_and_hms(2024, 5, 15, 13, 30, 0).unwrap())
    );

    let text = metrics.encode().unwrap();
    assert!(text.contains("feedmill_entries_inserted_total{source=\"kremlin\"} 3"));

    // Same feed again: nothing changed upstream
    let report = app::run(&config, storage.clone(), metrics, RunOptions::default(), shutdown)
        .await
        .unwrap();
    assert_eq!(report.stats.created, 0);
    assert_eq!(report.stats.unchanged, 3);
    assert_eq!(storage.count().unwrap(), 3);
}

#[tokio::test]
async fn test_run_once_notifies_index_now() {
    let server = MockServer::start().await;
    mount_kremlin_feed(&server).await;
    Mock::given(method("GET"))
        .and(path("/indexnow"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let mut config = kremlin_config(&server, &temp_dir.path().join("feed.db"));
    config.index_now.enabled = true;
    config.index_now.key = "test-key".into();
    config.index_now.endpoint = format!("{}/indexnow", server.uri());

    let storage = app::open_storage(&config.storage).unwrap();
    let (_stop, shutdown) = watch::channel(false);
    let report = app::run(
        &config,
        storage,
        Arc::new(Metrics::new().unwrap()),
        RunOptions { once: true },
        shutdown,
    )
    .await
    .unwrap();

    assert_eq!(report.walks[0].stop, StopReason::PageLimit);
    assert_eq!(report.walks[0].pages, 1);
    assert_eq!(report.stats.created, 2);
}
