// tests/providers_feed.rs
use chrono::{TimeZone, Utc};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hazard_ingest::ingest::providers::{feed::parse_feed, http_client, Adapters};
use hazard_ingest::model::{Source, SourceKind};
use hazard_ingest::Peril;

const FEED: &str = include_str!("fixtures/feed_rss.xml");

fn feed_source(base_url: String) -> Source {
    Source {
        id: "wire".into(),
        kind: SourceKind::Feed,
        base_url,
        enabled: true,
    }
}

fn adapters(fetch_timeout: Duration) -> Adapters {
    let client = http_client("Bot/1.0", fetch_timeout).expect("client");
    Adapters::http(client, fetch_timeout)
}

#[test]
fn fixture_items_are_normalized_and_classified() {
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
    let out = parse_feed(FEED, "wire", now).unwrap();
    assert_eq!(out.len(), 3, "blank-title item must be dropped");

    assert_eq!(out[0].title, "Severe flooding in Valencia as rivers burst banks");
    assert_eq!(
        out[0].summary,
        "Emergency services evacuated thousands after torrential rain."
    );
    assert_eq!(out[0].peril, Peril::Flood);
    assert_eq!(
        out[0].published_at,
        Utc.with_ymd_and_hms(2026, 10, 14, 8, 30, 0).unwrap()
    );

    assert_eq!(out[1].peril, Peril::Storm);
    assert_eq!(out[2].peril, Peril::Other);
    assert_eq!(out[2].published_at, now, "missing pubDate falls back to now");
    assert!(out.iter().all(|a| a.source_id == "wire" && a.lat.is_none()));
}

#[tokio::test]
async fn fetches_feed_over_http_with_bot_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("user-agent", "Bot/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .expect(1)
        .mount(&server)
        .await;

    let out = adapters(Duration::from_secs(5))
        .fetch(&feed_source(format!("{}/feed.xml", server.uri())), Utc::now())
        .await;
    assert_eq!(out.len(), 3);
    assert_eq!(out[1].url, "https://wire.test/lena-landfall");
}

#[tokio::test]
async fn server_error_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let out = adapters(Duration::from_secs(5))
        .fetch(&feed_source(format!("{}/feed.xml", server.uri())), Utc::now())
        .await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn unreachable_host_yields_empty_list() {
    let out = adapters(Duration::from_secs(2))
        .fetch(&feed_source("http://127.0.0.1:9/feed.xml".into()), Utc::now())
        .await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn slow_source_is_cut_by_fetch_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(FEED)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let out = adapters(Duration::from_millis(200))
        .fetch(&feed_source(format!("{}/feed.xml", server.uri())), Utc::now())
        .await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn garbage_body_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not xml at all {"))
        .mount(&server)
        .await;

    let out = adapters(Duration::from_secs(5))
        .fetch(&feed_source(format!("{}/feed.xml", server.uri())), Utc::now())
        .await;
    assert!(out.is_empty());
}
