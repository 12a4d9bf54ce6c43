use axum_test::TestServer;
use logstream::app::router::api_router;
use logstream::app::state::AppState;
use logstream::broadcaster::Broadcaster;
use logstream::config::Settings;
use logstream::domain::LogEntry;
use logstream::store::LogStore;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn test_settings(admin_key: &str, db_path: PathBuf) -> Settings {
    Settings {
        admin_key: admin_key.to_string(),
        db_path,
        log_retention_days: 7,
        max_db_size_mb: 2048,
        retention_check_interval_seconds: 3600,
        sse_max_lines_per_second: 50,
        extra_scrub_patterns: String::new(),
        container_poll_interval_seconds: 10,
        http_port: 8080,
    }
}

fn test_app(admin_key: &str) -> (TestServer, Arc<LogStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test_api.db");
    let store = Arc::new(LogStore::open(&db_path).unwrap());
    let state = AppState::new(
        store.clone(),
        Arc::new(Broadcaster::new()),
        test_settings(admin_key, db_path),
    );
    let server = TestServer::new(api_router(state)).unwrap();
    (server, store, dir)
}

fn entry(service: &str, level: &str, timestamp: &str, message: &str) -> LogEntry {
    LogEntry {
        service: service.to_string(),
        level: level.to_string(),
        timestamp: timestamp.to_string(),
        trace_id: None,
        message: message.to_string(),
        raw: "{}".to_string(),
    }
}

const KEY: &str = "test-secret-key";

#[tokio::test]
async fn test_health_requires_no_auth() {
    let (server, _store, _dir) = test_app(KEY);

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["retention_days"], 7);
    assert_eq!(body["max_db_size_mb"], 2048);
    assert!(body["db_size_bytes"].is_u64());
    assert!(body["db_size_mb"].is_number());
}

#[tokio::test]
async fn test_search_requires_auth() {
    let (server, _store, _dir) = test_app(KEY);
    server.get("/v1/logs/search").await.assert_status_unauthorized();
}

#[tokio::test]
async fn test_wrong_key_is_unauthorized() {
    let (server, _store, _dir) = test_app(KEY);
    server
        .get("/v1/logs/search")
        .add_header("x-admin-key", "wrong")
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_services_and_context_require_auth() {
    let (server, _store, _dir) = test_app(KEY);
    server.get("/v1/logs/services").await.assert_status_unauthorized();
    server.get("/v1/logs/1/context").await.assert_status_unauthorized();
    server.get("/v1/logs/stream").await.assert_status_unauthorized();
}

#[tokio::test]
async fn test_empty_admin_key_means_open_access() {
    let (server, _store, _dir) = test_app("");
    server.get("/v1/logs/search").await.assert_status_ok();
}

#[tokio::test]
async fn test_empty_search() {
    let (server, _store, _dir) = test_app(KEY);
    let response = server.get("/v1/logs/search").add_header("x-admin-key", KEY).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["entries"], serde_json::json!([]));
    assert_eq!(body["count"], 0);
    assert_eq!(body["limit"], 100);
    assert_eq!(body["offset"], 0);
}

#[tokio::test]
async fn test_search_returns_inserted_records() {
    let (server, store, _dir) = test_app(KEY);
    store
        .insert(entry("dispatcher", "info", "2025-02-21T10:00:00+00:00", "hello world"))
        .unwrap();

    let response = server.get("/v1/logs/search").add_header("x-admin-key", KEY).await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["entries"][0]["message"], "hello world");
    assert_eq!(body["entries"][0]["service"], "dispatcher");
}

#[tokio::test]
async fn test_search_filters_by_service_and_level() {
    let (server, store, _dir) = test_app(KEY);
    store
        .insert_batch(vec![
            entry("dispatcher", "error", "2025-02-21T10:00:00+00:00", "boom"),
            entry("dispatcher", "info", "2025-02-21T10:01:00+00:00", "fine"),
            entry("einbroch", "error", "2025-02-21T10:02:00+00:00", "other"),
        ])
        .unwrap();

    let response = server
        .get("/v1/logs/search")
        .add_query_param("service", "dispatcher")
        .add_query_param("level", "error")
        .add_header("x-admin-key", KEY)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["entries"][0]["message"], "boom");
}

#[tokio::test]
async fn test_full_text_query_parameter() {
    let (server, store, _dir) = test_app(KEY);
    store
        .insert_batch(vec![
            entry("dispatcher", "info", "2025-02-21T10:00:00+00:00", "pipeline started"),
            entry("einbroch", "error", "2025-02-21T10:01:00+00:00", "tool failed"),
        ])
        .unwrap();

    let response = server
        .get("/v1/logs/search")
        .add_query_param("q", "pipeline")
        .add_header("x-admin-key", KEY)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_search_rejects_out_of_range_limit() {
    let (server, _store, _dir) = test_app(KEY);
    server
        .get("/v1/logs/search")
        .add_query_param("limit", "0")
        .add_header("x-admin-key", KEY)
        .await
        .assert_status_bad_request();
    server
        .get("/v1/logs/search")
        .add_query_param("limit", "1001")
        .add_header("x-admin-key", KEY)
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_pagination_parameters_echoed() {
    let (server, store, _dir) = test_app(KEY);
    let entries = (0..25)
        .map(|i| {
            entry(
                "s",
                "info",
                &format!("2025-02-21T10:{i:02}:00+00:00"),
                &format!("msg{i}"),
            )
        })
        .collect();
    store.insert_batch(entries).unwrap();

    let response = server
        .get("/v1/logs/search")
        .add_query_param("limit", "10")
        .add_query_param("offset", "0")
        .add_header("x-admin-key", KEY)
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 10);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["offset"], 0);
}

#[tokio::test]
async fn test_services_endpoint() {
    let (server, store, _dir) = test_app(KEY);
    store
        .insert_batch(vec![
            entry("einbroch", "info", "2025-02-21T10:00:00+00:00", "a"),
            entry("dispatcher", "info", "2025-02-21T10:01:00+00:00", "b"),
        ])
        .unwrap();

    let response = server.get("/v1/logs/services").add_header("x-admin-key", KEY).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["services"], serde_json::json!(["dispatcher", "einbroch"]));
}

#[tokio::test]
async fn test_context_returns_surrounding_lines() {
    let (server, store, _dir) = test_app(KEY);
    let entries = (0..20)
        .map(|i| {
            entry(
                "dispatcher",
                "info",
                &format!("2025-02-21T10:{i:02}:00+00:00"),
                &format!("line {i}"),
            )
        })
        .collect();
    let records = store.insert_batch(entries).unwrap();
    let target_id = records[10].id;

    let response = server
        .get(&format!("/v1/logs/{target_id}/context"))
        .add_query_param("lines", "6")
        .add_header("x-admin-key", KEY)
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["target_id"], target_id);
    let entries = body["entries"].as_array().unwrap();
    assert!(!entries.is_empty() && entries.len() <= 7);
    assert!(entries.iter().all(|e| e["service"] == "dispatcher"));
    assert!(entries.iter().any(|e| e["id"] == target_id));
}

#[tokio::test]
async fn test_context_not_found() {
    let (server, _store, _dir) = test_app(KEY);
    server
        .get("/v1/logs/99999/context")
        .add_header("x-admin-key", KEY)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_context_rejects_out_of_range_lines() {
    let (server, store, _dir) = test_app(KEY);
    let record = store
        .insert(entry("s", "info", "2025-02-21T10:00:00+00:00", "m"))
        .unwrap();
    server
        .get(&format!("/v1/logs/{}/context", record.id))
        .add_query_param("lines", "201")
        .add_header("x-admin-key", KEY)
        .await
        .assert_status_bad_request();
}
