use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sagepipe::{FileWarehouse, Runtime, TableRef, Warehouse};

mod common;

use common::sage_mock::{forbid_token_calls, mount_contacts, mount_refresh};
use common::{test_settings, token_row, MemoryWarehouse};

fn token_table() -> TableRef {
    TableRef::new("acme", "etl_tokens", "oauth_tokens")
}

fn contacts_table() -> TableRef {
    TableRef::new("acme", "etl_sage", "sage_contacts")
}

fn seeded_warehouse() -> Arc<MemoryWarehouse> {
    let now = Utc::now();
    let wh = MemoryWarehouse::new();
    wh.seed(
        &token_table(),
        token_row("live-token", Some("r1"), now, now + Duration::hours(1)),
    );
    wh
}

#[tokio::test]
async fn pipeline_loads_transformed_contacts() {
    let server = MockServer::start().await;
    forbid_token_calls(&server).await;
    Mock::given(method("GET"))
        .and(path("/v3.1/contacts"))
        .and(header("authorization", "Bearer live-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "$total": 2,
            "$items": [
                { "id": 1, "name": "A", "email": { "address": "a@x.com" } },
                { "id": 2, "name": "B" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wh = seeded_warehouse();
    let rt = Runtime::with_parts(test_settings(&server.uri()), wh.clone()).unwrap();
    let summary = rt.run_pipeline(None, false).await.unwrap();

    assert_eq!(summary.table, "acme.etl_sage.sage_contacts");
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.row_errors, 0);
    assert_eq!(wh.write_count(), 1);

    let rows: Vec<serde_json::Value> = wh
        .rows(&contacts_table())
        .into_iter()
        .map(serde_json::Value::Object)
        .collect();
    assert_eq!(
        rows,
        vec![
            json!({ "id": 1, "name": "A", "contact_type": null, "email": "a@x.com" }),
            json!({ "id": 2, "name": "B", "contact_type": null, "email": null }),
        ]
    );
}

#[tokio::test]
async fn pipeline_with_no_items_writes_nothing() {
    let server = MockServer::start().await;
    mount_contacts(&server, json!({ "$total": 0, "$items": [] })).await;

    let wh = seeded_warehouse();
    let rt = Runtime::with_parts(test_settings(&server.uri()), wh.clone()).unwrap();
    let summary = rt.run_pipeline(None, false).await.unwrap();

    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.inserted, 0);
    assert_eq!(wh.write_count(), 0);
}

#[tokio::test]
async fn dry_run_skips_the_load() {
    let server = MockServer::start().await;
    mount_contacts(&server, json!({ "items": [{ "id": 7, "name": "G" }] })).await;

    let wh = seeded_warehouse();
    let rt = Runtime::with_parts(test_settings(&server.uri()), wh.clone()).unwrap();
    let summary = rt.run_pipeline(None, true).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.transformed, 1);
    assert_eq!(wh.write_count(), 0);
}

#[tokio::test]
async fn pipeline_honours_table_override() {
    let server = MockServer::start().await;
    mount_contacts(&server, json!({ "$items": [{ "id": 1 }] })).await;

    let wh = seeded_warehouse();
    let rt = Runtime::with_parts(test_settings(&server.uri()), wh.clone()).unwrap();
    let summary = rt
        .run_pipeline(Some("other.staging.contacts"), false)
        .await
        .unwrap();

    assert_eq!(summary.table, "other.staging.contacts");
    assert_eq!(wh.rows(&TableRef::new("other", "staging", "contacts")).len(), 1);
    assert!(wh.rows(&contacts_table()).is_empty());
}

#[tokio::test]
async fn expired_token_is_refreshed_before_fetching() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        json!({ "access_token": "fresh", "expires_in": 300 }),
        1,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v3.1/contacts"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "$items": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let now = Utc::now();
    let wh = MemoryWarehouse::new();
    wh.seed(
        &token_table(),
        token_row("stale", Some("r1"), now - Duration::hours(2), now - Duration::hours(1)),
    );
    let rt = Runtime::with_parts(test_settings(&server.uri()), wh.clone()).unwrap();
    rt.run_pipeline(None, false).await.unwrap();

    // one write for the refreshed token, none for the empty load
    assert_eq!(wh.write_count(), 1);
    assert_eq!(wh.rows(&token_table()).len(), 2);
}

#[tokio::test]
async fn api_failure_surfaces_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3.1/contacts"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let wh = seeded_warehouse();
    let rt = Runtime::with_parts(test_settings(&server.uri()), wh.clone()).unwrap();
    let err = rt.run_pipeline(None, false).await.unwrap_err();
    assert_eq!(err.code(), "network_error");
    assert_eq!(err.http_status(), Some(503));
    assert_eq!(wh.write_count(), 0);
}

#[tokio::test]
async fn file_warehouse_round_trips_tokens_and_contacts() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        json!({ "access_token": "fresh", "refresh_token": "r2", "expires_in": 3600 }),
        1,
    )
    .await;
    mount_contacts(&server, json!({ "$items": [{ "id": "c1", "name": "Acme" }] })).await;

    let dir = tempfile::tempdir().unwrap();
    let wh = Arc::new(FileWarehouse::new(dir.path()));
    let now = Utc::now();
    wh.insert_rows(
        &token_table(),
        &[token_row("stale", Some("r1"), now - Duration::hours(2), now - Duration::hours(1))],
    )
    .await
    .unwrap();

    let rt = Runtime::with_parts(test_settings(&server.uri()), wh.clone()).unwrap();
    let summary = rt.run_pipeline(None, false).await.unwrap();
    assert_eq!(summary.inserted, 1);

    let latest = rt.token_store().get_latest("sage").await.unwrap().unwrap();
    assert_eq!(latest.access_token, "fresh");

    let contacts = std::fs::read_to_string(wh.table_path(&contacts_table())).unwrap();
    assert_eq!(contacts.lines().count(), 1);
    assert!(contacts.contains("\"Acme\""));
}
