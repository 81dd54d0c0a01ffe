//! Feed source integration tests
//!
//! Each listing format is read through a real HTTP round trip against a
//! mocked server.

use chrono::{TimeZone, Utc};
use feedmill::models::SourceKind;
use feedmill::sources::{FeedSource, MidListingSource, MilNewsSource, SyndicationSource};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{cp1251, KREMLIN_PAGE_1, MID_LISTING, MIL_NEWS};
use crate::common::fast_fetcher;

#[tokio::test]
async fn test_syndication_source_resolves_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/atom+xml; charset=utf-8")
                .set_body_string(KREMLIN_PAGE_1),
        )
        .mount(&server)
        .await;

    let source = SyndicationSource::new(fast_fetcher(), SourceKind::Kremlin, "ru");
    let page = source
        .fetch_page(&format!("{}/feed", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.entries.len(), 2);
    assert_eq!(
        page.links.next_link(),
        Some(format!("{}/feed?page=2", server.uri()).as_str())
    );

    let first = &page.entries[0];
    assert_eq!(first.url, "http://kremlin.ru/events/president/news/74001");
    assert_eq!(first.source, SourceKind::Kremlin);
    assert_eq!(first.language, "ru");
    assert_eq!(first.title, "Совещание с членами Правительства");
    assert!(first.content.contains("Владимир Путин провёл совещание."));
    assert_eq!(
        first.updated,
        Some(Utc.with_ymd_and_hms(2024, 5, 15, 13, 30, 0).unwrap())
    );
}

#[tokio::test]
async fn test_mid_listing_in_windows_1251() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ru/foreign_policy/news/"))
        .and(query_param("PAGEN_1", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=windows-1251")
                .set_body_bytes(cp1251(MID_LISTING)),
        )
        .mount(&server)
        .await;

    let source = MidListingSource::new(fast_fetcher(), SourceKind::Mid, "ru");
    let page = source
        .fetch_page(&format!("{}/ru/foreign_policy/news/?PAGEN_1=1", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.entries.len(), 2);
    assert!(page.links.next_link().is_none());

    let first = &page.entries[0];
    assert_eq!(
        first.url,
        format!("{}/ru/foreign_policy/news/1950000/", server.uri())
    );
    assert_eq!(first.title, "Брифинг официального представителя");
    assert_eq!(
        first.published,
        Some(Utc.with_ymd_and_hms(2024, 5, 15, 9, 30, 0).unwrap())
    );
    assert!(first.updated.is_none());
    assert!(!first.has_content());
    assert_eq!(page.entries[1].title, "Заявление МИД России");
}

#[tokio::test]
async fn test_mil_news_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/news"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(MIL_NEWS),
        )
        .mount(&server)
        .await;

    let source = MilNewsSource::new(fast_fetcher(), SourceKind::Mil, "ru");
    let page = source
        .fetch_page(&format!("{}/api/news?offset=0", server.uri()))
        .await
        .unwrap();

    assert_eq!(page.entries.len(), 2);
    let urls: Vec<&str> = page.entries.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(
        urls,
        ["https://mil.ru/news/12500001", "https://mil.ru/news/12500002"]
    );

    let first = &page.entries[0];
    assert_eq!(first.title, "Учения в Западном военном округе");
    assert!(first.has_content());
    assert_eq!(
        first.published,
        Some(Utc.with_ymd_and_hms(2024, 5, 15, 7, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_source_reports_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = SyndicationSource::new(fast_fetcher(), SourceKind::Kremlin, "ru");
    let err = source
        .fetch_page(&format!("{}/feed", server.uri()))
        .await
        .unwrap_err();

    assert!(err.is_transient());
}
