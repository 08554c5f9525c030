//! End-to-end reconciliation scenarios against a mocked backend.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rss_digest::controller::{Controller, SyncOptions};
use rss_digest::gateway::Gateway;
use rss_digest::sync::SourceDraft;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
}

fn controller(server: &MockServer, options: SyncOptions, date: NaiveDate) -> Controller {
    let gateway = Gateway::new(
        Url::parse(&server.uri()).unwrap(),
        Duration::from_secs(5),
        None,
    )
    .unwrap();
    Controller::new(gateway, options, date)
}

fn source(id: i64, url: &str, title: &str, category: &str, unread: u64) -> Value {
    json!({
        "id": id,
        "url": url,
        "title": title,
        "category": category,
        "unread_count": unread,
        "has_unread": unread > 0,
        "latest_entry_at": null,
    })
}

fn entry(id: i64, title: &str, unread: bool) -> Value {
    json!({
        "id": id,
        "title": title,
        "link": format!("https://a.com/{id}"),
        "published_at": "2026-02-12T09:00:00",
        "source_title": "A",
        "summary": "",
        "content": "",
        "unread": unread,
    })
}

fn digest(date: &str, categories: Value) -> Value {
    let total: usize = categories
        .as_object()
        .map(|m| m.values().filter_map(Value::as_array).map(Vec::len).sum())
        .unwrap_or(0);
    json!({"date": date, "total": total, "categories": categories})
}

async fn mount_sources(server: &MockServer, body: Value, expect: u64) {
    Mock::given(method("GET"))
        .and(path("/sources/meta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expect)
        .mount(server)
        .await;
}

async fn mount_digest(server: &MockServer, date: &str, body: Value, expect: u64) {
    Mock::given(method("GET"))
        .and(path("/digest"))
        .and(query_param("date", date))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(expect)
        .mount(server)
        .await;
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_create_then_refresh_shows_server_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sources"))
        .and(body_json(
            json!({"url": "https://a.com/feed", "title": "A", "category": "Tech"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "url": "https://a.com/feed", "title": "A", "category": "Tech"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_sources(
        &server,
        json!([source(1, "https://a.com/feed", "A", "Tech", 0)]),
        1,
    )
    .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    assert!(ctl.snapshot().sources.is_empty());

    let draft = SourceDraft::new("https://a.com/feed", "A")
        .unwrap()
        .with_category("Tech");
    ctl.create_source(draft);
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message, None);
    assert_eq!(snapshot.sources.len(), 1);
    let created = &snapshot.sources[0];
    assert_eq!(created.url, "https://a.com/feed");
    assert_eq!(created.category, "Tech");
    assert_eq!(created.unread_count, 0);
    assert!(!created.has_unread);
    assert_eq!(snapshot.total_unread, 0);
}

#[tokio::test]
async fn test_create_accepted_without_record_still_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sources"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_sources(
        &server,
        json!([source(1, "https://a.com/feed", "A", "Tech", 0)]),
        1,
    )
    .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.create_source(SourceDraft::new("https://a.com/feed", "A").unwrap());
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message, None);
    assert_eq!(snapshot.sources.len(), 1);
    assert_eq!(snapshot.sources[0].url, "https://a.com/feed");
}

#[tokio::test]
async fn test_create_rejected_surfaces_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sources"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "duplicate"})))
        .mount(&server)
        .await;
    mount_sources(&server, json!([]), 0).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.create_source(SourceDraft::new("https://a.com/feed", "A").unwrap());
    ctl.settle().await;

    assert_eq!(ctl.snapshot().message.as_deref(), Some("cannot add subscription"));
}

#[tokio::test]
async fn test_remove_twice_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sources/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "deleted"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/sources/5"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Source not found"})))
        .mount(&server)
        .await;
    mount_sources(&server, json!([source(6, "https://b.com/feed", "B", "X", 2)]), 2).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.remove_source(5);
    ctl.settle().await;
    let first = ctl.snapshot();

    ctl.remove_source(5);
    ctl.settle().await;
    let second = ctl.snapshot();

    assert_eq!(second.message, None);
    assert_eq!(first.sources, second.sources);
    assert_eq!(second.total_unread, 2);
}

#[tokio::test]
async fn test_remove_failure_still_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sources/5"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_sources(&server, json!([source(5, "https://a.com/feed", "A", "X", 1)]), 1).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.remove_source(5);
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message.as_deref(), Some("cannot remove subscription"));
    assert_eq!(snapshot.sources.len(), 1);
}

#[tokio::test]
async fn test_seed_tolerates_rejections_and_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sources"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "exists"})))
        .expect(2)
        .mount(&server)
        .await;
    mount_sources(
        &server,
        json!([source(1, "https://hnrss.org/frontpage", "Hacker News", "科技", 3)]),
        1,
    )
    .await;

    let options = SyncOptions {
        seeds: vec![
            SourceDraft::new("https://hnrss.org/frontpage", "Hacker News")
                .unwrap()
                .with_category("科技"),
            SourceDraft::new("https://example.com/rss", "Example").unwrap(),
        ],
        ..SyncOptions::default()
    };
    let mut ctl = controller(&server, options, day(12));
    ctl.seed_default_sources();
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message, None);
    assert_eq!(snapshot.total_unread, 3);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_sources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sources/meta"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([source(1, "https://a.com/feed", "A", "X", 4)])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sources/meta"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.refresh_sources();
    ctl.settle().await;
    ctl.refresh_sources();
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message.as_deref(), Some("cannot refresh subscriptions"));
    assert_eq!(snapshot.sources.len(), 1);
    assert_eq!(snapshot.total_unread, 4);
}

#[tokio::test]
async fn test_inconsistent_has_unread_is_normalized() {
    let server = MockServer::start().await;
    mount_sources(
        &server,
        json!([{"id": 1, "url": "u", "title": "t", "category": "c",
                "unread_count": 0, "has_unread": true, "latest_entry_at": null}]),
        1,
    )
    .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.refresh_sources();
    ctl.settle().await;

    assert!(!ctl.snapshot().sources[0].has_unread);
}

// ============================================================================
// Digest
// ============================================================================

#[tokio::test]
async fn test_mark_read_updates_both_views() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/entries/1/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "read"})))
        .expect(1)
        .mount(&server)
        .await;
    // First load sees the entry unread; the refresh after the mutation sees it read.
    Mock::given(method("GET"))
        .and(path("/digest"))
        .and(query_param("date", "2026-02-12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(digest(
            "2026-02-12",
            json!({"Tech": [entry(1, "First", true)]}),
        )))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sources/meta"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([source(1, "https://a.com/feed", "A", "Tech", 1)])),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_digest(
        &server,
        "2026-02-12",
        digest("2026-02-12", json!({"Tech": [entry(1, "First", false)]})),
        1,
    )
    .await;
    mount_sources(&server, json!([source(1, "https://a.com/feed", "A", "Tech", 0)]), 1).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.start();
    ctl.settle().await;

    let before = ctl.snapshot();
    assert!(before.digest().unwrap().entry(1).unwrap().unread);
    assert_eq!(before.sources[0].unread_count, 1);
    assert!(before.sources[0].has_unread);
    assert_eq!(before.total_unread, 1);

    ctl.mark_read(1);
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message, None);
    let digest = snapshot.digest().unwrap();
    assert!(!digest.entry(1).unwrap().unread);
    assert_eq!(snapshot.sources[0].unread_count, 0);
    assert!(!snapshot.sources[0].has_unread);
    assert_eq!(snapshot.total_unread, 0);
}

#[tokio::test]
async fn test_mark_read_failure_skips_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/entries/1/read"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_sources(&server, json!([]), 0).await;
    mount_digest(&server, "2026-02-12", digest("2026-02-12", json!({})), 0).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.mark_read(1);
    ctl.settle().await;

    assert_eq!(ctl.snapshot().message.as_deref(), Some("cannot mark entry as read"));
}

#[tokio::test]
async fn test_mark_read_refreshes_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/entries/1/read"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sources/meta"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_digest(
        &server,
        "2026-02-12",
        digest("2026-02-12", json!({"Tech": [entry(1, "First", false)]})),
        1,
    )
    .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.mark_read(1);
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message.as_deref(), Some("cannot refresh subscriptions"));
    assert!(!snapshot.digest().unwrap().entry(1).unwrap().unread);
}

#[tokio::test]
async fn test_empty_day_is_no_digest_not_error() {
    let server = MockServer::start().await;
    mount_digest(&server, "2026-02-13", digest("2026-02-13", json!({})), 1).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.select_date(day(13));
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message, None);
    assert_eq!(snapshot.selected_date, day(13));
    assert!(snapshot.has_empty_digest());
    assert_eq!(snapshot.digest().unwrap().total, 0);
}

#[tokio::test]
async fn test_categories_keep_server_order() {
    let server = MockServer::start().await;
    // Raw body so key order is exactly what the backend wrote.
    let body = r#"{"date":"2026-02-12","total":2,"categories":{
        "Zeta":[{"id":1,"title":"z","link":"l","published_at":"2026-02-12T01:00:00","source_title":"s","summary":"","content":"","unread":true}],
        "Alpha":[{"id":2,"title":"a","link":"l","published_at":"2026-02-12T02:00:00","source_title":"s","summary":"","content":"","unread":true}]
    }}"#;
    Mock::given(method("GET"))
        .and(path("/digest"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.refresh_digest();
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    let names: Vec<&str> = snapshot
        .categories()
        .iter()
        .map(|group| group.name.as_str())
        .collect();
    assert_eq!(names, vec!["Zeta", "Alpha"]);
}

#[tokio::test]
async fn test_failed_load_never_shows_other_date() {
    let server = MockServer::start().await;
    mount_digest(
        &server,
        "2026-02-12",
        digest("2026-02-12", json!({"Tech": [entry(1, "First", true)]})),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/digest"))
        .and(query_param("date", "2026-02-14"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.refresh_digest();
    ctl.settle().await;
    assert!(ctl.snapshot().digest().is_some());

    ctl.select_date(day(14));
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message.as_deref(), Some("cannot fetch digest"));
    assert!(snapshot.digest().is_none());
    assert_eq!(snapshot.selected_date, day(14));
}

async fn mount_racing_digests(server: &MockServer) {
    // First request is answered late, second one immediately.
    Mock::given(method("GET"))
        .and(path("/digest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(digest("2026-02-12", json!({"Tech": [entry(1, "old", true)]})))
                .set_delay(Duration::from_millis(400)),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/digest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(digest("2026-02-12", json!({"Tech": [entry(1, "new", true)]}))),
        )
        .mount(server)
        .await;
}

async fn race(ctl: &mut Controller) -> String {
    ctl.refresh_digest();
    tokio::time::sleep(Duration::from_millis(100)).await;
    ctl.refresh_digest();
    ctl.settle().await;
    ctl.snapshot().digest().unwrap().entry(1).unwrap().title.clone()
}

#[tokio::test]
async fn test_last_completed_digest_wins_by_default() {
    let server = MockServer::start().await;
    mount_racing_digests(&server).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    assert_eq!(race(&mut ctl).await, "old");
}

#[tokio::test]
async fn test_superseded_digest_discarded_when_enabled() {
    let server = MockServer::start().await;
    mount_racing_digests(&server).await;

    let options = SyncOptions {
        discard_stale_digests: true,
        ..SyncOptions::default()
    };
    let mut ctl = controller(&server, options, day(12));
    assert_eq!(race(&mut ctl).await, "new");
}

// ============================================================================
// Ingestion
// ============================================================================

#[tokio::test]
async fn test_ingest_detail_surfaced_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({"detail": "rate limited"})))
        .expect(1)
        .mount(&server)
        .await;
    // One call for the initial load, none from the failed ingestion.
    mount_sources(&server, json!([source(1, "https://a.com/feed", "A", "X", 2)]), 1).await;
    mount_digest(&server, "2026-02-12", digest("2026-02-12", json!({})), 0).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.refresh_sources();
    ctl.settle().await;

    ctl.ingest_now();
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message.as_deref(), Some("rate limited"));
    assert_eq!(snapshot.total_unread, 2);
}

#[tokio::test]
async fn test_ingest_without_detail_uses_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.ingest_now();
    ctl.settle().await;

    assert_eq!(ctl.snapshot().message.as_deref(), Some("ingestion failed"));
}

#[tokio::test]
async fn test_ingest_success_refreshes_both() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"inserted": 3})))
        .mount(&server)
        .await;
    mount_sources(&server, json!([source(1, "https://a.com/feed", "A", "Tech", 3)]), 1).await;
    mount_digest(
        &server,
        "2026-02-12",
        digest(
            "2026-02-12",
            json!({"Tech": [entry(1, "a", true), entry(2, "b", true), entry(3, "c", true)]}),
        ),
        1,
    )
    .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.ingest_now();
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message, None);
    assert_eq!(snapshot.digest().unwrap().total, 3);
    assert_eq!(snapshot.total_unread, 3);
}

#[tokio::test]
async fn test_ingest_with_unexpected_body_still_refreshes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "inserted": null})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_sources(&server, json!([source(1, "https://a.com/feed", "A", "Tech", 1)]), 1).await;
    mount_digest(
        &server,
        "2026-02-12",
        digest("2026-02-12", json!({"Tech": [entry(1, "a", true)]})),
        1,
    )
    .await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.ingest_now();
    ctl.settle().await;

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.message, None);
    assert_eq!(snapshot.digest().unwrap().total, 1);
    assert_eq!(snapshot.total_unread, 1);
}

#[tokio::test]
async fn test_new_operation_clears_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_sources(&server, json!([]), 1).await;

    let mut ctl = controller(&server, SyncOptions::default(), day(12));
    ctl.ingest_now();
    ctl.settle().await;
    assert!(ctl.snapshot().message.is_some());

    ctl.refresh_sources();
    assert_eq!(ctl.snapshot().message, None);
    ctl.settle().await;
    assert_eq!(ctl.snapshot().message, None);
}
