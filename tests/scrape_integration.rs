//! Integration tests for the scraper: mock menu sites over HTTP, staged into SQLite.

use std::time::Duration;

use parkmenu_core::scrape::{RetryPolicy, Scraper, SourceKind, Staging};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::fixtures::{Row, menu_page, profile, setup_test_db};
use support::socket_guard::start_mock_server_or_skip;

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(1),
        Duration::from_millis(5),
        2.0,
    )
}

fn casey_rows() -> Vec<Row<'static>> {
    vec![
        Row {
            name: "All-Beef Hot Dog",
            desc: Some("Served with chips"),
            price: Some("$11.49"),
            cal: Some("620 cal"),
        },
        Row {
            name: "Corn Dog Nuggets",
            desc: None,
            price: Some("$10.99"),
            cal: None,
        },
    ]
}

#[tokio::test]
async fn test_scrape_site_extracts_and_continues_past_failed_page() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/mk/caseys"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(menu_page("Casey's Corner", "Main Street, U.S.A.", &casey_rows())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mk/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let site = profile(
        "fanblog.example",
        SourceKind::Blog,
        "Magic Kingdom",
        vec![
            format!("{}/mk/caseys", server.uri()),
            format!("{}/mk/missing", server.uri()),
        ],
    );
    let scraper = Scraper::new(Duration::ZERO, fast_retry(3)).unwrap();
    let report = scraper.scrape_site(&site).await;

    assert_eq!(report.pages_ok, 1);
    assert_eq!(report.failed_pages.len(), 1);
    assert!(report.failed_pages[0].0.ends_with("/mk/missing"));
    assert_eq!(report.items.len(), 2);

    let hot_dog = &report.items[0];
    assert_eq!(hot_dog.restaurant, "Casey's Corner");
    assert_eq!(hot_dog.land.as_deref(), Some("Main Street, U.S.A."));
    assert_eq!(hot_dog.price, Some(11.49));
    assert_eq!(hot_dog.nutrition.and_then(|n| n.calories), Some(620.0));
    assert_eq!(
        hot_dog.photo_url.as_deref(),
        Some(format!("{}/img/item.jpg", server.uri()).as_str())
    );
    assert!(report.items[1].nutrition.is_none());
}

#[tokio::test]
async fn test_scrape_retries_transient_server_errors() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/menu"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/menu"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(menu_page("Casey's Corner", "Main Street, U.S.A.", &casey_rows())),
        )
        .mount(&server)
        .await;

    let site = profile(
        "disneyworld.example",
        SourceKind::Official,
        "Magic Kingdom",
        vec![format!("{}/menu", server.uri())],
    );
    let scraper = Scraper::new(Duration::ZERO, fast_retry(3)).unwrap();
    let report = scraper.scrape_site(&site).await;

    assert_eq!(report.pages_ok, 1);
    assert!(report.failed_pages.is_empty());
    assert_eq!(report.items.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_scrape_does_not_retry_permanent_errors() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let site = profile(
        "aggregator.example",
        SourceKind::Aggregator,
        "EPCOT",
        vec![format!("{}/gone", server.uri())],
    );
    let scraper = Scraper::new(Duration::ZERO, fast_retry(4)).unwrap();
    let report = scraper.scrape_site(&site).await;

    assert_eq!(report.pages_ok, 0);
    assert_eq!(report.failed_pages.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_scraped_items_stage_once() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/menu"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(menu_page("Casey's Corner", "Main Street, U.S.A.", &casey_rows())),
        )
        .mount(&server)
        .await;

    let (db, _temp_dir) = setup_test_db().await;
    let staging = Staging::new(db);
    let site = profile(
        "fanblog.example",
        SourceKind::Blog,
        "Magic Kingdom",
        vec![format!("{}/menu", server.uri())],
    );
    let scraper = Scraper::new(Duration::ZERO, fast_retry(1)).unwrap();

    let first = staging.stage(&scraper.scrape_site(&site).await.items).await.unwrap();
    assert_eq!(first.inserted, 2);
    assert_eq!(first.duplicates, 0);

    let second = staging.stage(&scraper.scrape_site(&site).await.items).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);

    assert_eq!(staging.counts().await.unwrap(), (2, 0));
    assert_eq!(staging.unmerged().await.unwrap().len(), 2);
}
