use adcomm::api::{self, AppState};
use adcomm::cache::CacheLayer;
use adcomm::config::Config;
use adcomm::db::init_db;
use adcomm::domain::{AdvertiserId, Decimal, RawActivityRecord};
use adcomm::orchestration::{DiagnosticRecomputer, RangeBounds, RefreshCoordinator};
use adcomm::recordstore::{MockRecordStore, RecordStoreError, StaticRoster};
use axum::http::StatusCode;
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

fn dec(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
}

fn row(
    id: &str,
    advertiser: &str,
    date: NaiveDate,
    spend: &str,
    collected: &str,
    orders: i64,
) -> RawActivityRecord {
    RawActivityRecord {
        id: id.to_string(),
        advertiser: AdvertiserId::new(advertiser),
        date,
        ad_spend_usd: dec(spend),
        collected_amount_local: dec(collected),
        order_count: orders,
    }
}

async fn setup_test_app(advertisers: &[&str]) -> (axum::Router, Arc<MockRecordStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let cache = CacheLayer::new(pool.clone());
    let store = Arc::new(MockRecordStore::new());
    let roster = Arc::new(StaticRoster::new(
        advertisers.iter().map(|a| AdvertiserId::new(*a)).collect(),
    ));
    let bounds = RangeBounds::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let config = Config {
        port: 0,
        database_path: db_path,
        record_store_url: "http://example.invalid".to_string(),
        record_store_timeout_ms: 1000,
        default_fx_rate: dec("20"),
        advertisers: advertisers.iter().map(|s| s.to_string()).collect(),
        min_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    };

    let coordinator = RefreshCoordinator::new(store.clone(), roster.clone(), cache.clone(), bounds);
    let diagnostic = DiagnosticRecomputer::new(store.clone(), roster, cache, bounds);
    let state = AppState::new(config, coordinator, diagnostic, pool);

    (api::create_router(state), store, temp_dir)
}

async fn get_json(
    app: axum::Router,
    uri: &str,
) -> (StatusCode, serde_json::Value) {
    let request = axum::http::Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap();
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _store, _tmp) = setup_test_app(&["A"]).await;
    let (status, body) = get_json(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let (app, _store, _tmp) = setup_test_app(&["A"]).await;
    let (status, body) = get_json(app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_get_daily_end_to_end() {
    let (app, store, _tmp) = setup_test_app(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let (status, body) = get_json(app, "/daily?date=2025-08-01&fxRate=20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2025-08-01");

    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["advertiser"], "A");
    assert_eq!(record["roi"], 0.8);
    assert_eq!(record["tier"], "QUALIFIED");
    assert_eq!(record["commissionPerOrder"], 5);
    assert_eq!(record["totalCommission"], 50);
    assert_eq!(record["orderCount"], 10);
    assert!(record.get("computedAt").is_some());
    // Fingerprints never cross the API boundary.
    assert!(record.get("sourceFingerprint").is_none());
}

#[tokio::test]
async fn test_get_daily_sums_rows_before_evaluation() {
    let (app, store, _tmp) = setup_test_app(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));
    store.push_row(row("r2", "A", date(1), "50", "1100", 5));

    let (status, body) = get_json(app, "/daily?date=2025-08-01&fxRate=20").await;
    assert_eq!(status, StatusCode::OK);
    let record = &body["records"][0];
    assert_eq!(record["roi"], 0.9);
    assert_eq!(record["orderCount"], 15);
    assert_eq!(record["totalCommission"], 75);
}

#[tokio::test]
async fn test_get_daily_emits_zero_activity_records() {
    let (app, store, _tmp) = setup_test_app(&["A", "B"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let (_, body) = get_json(app, "/daily?date=2025-08-01").await;
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    let b = records.iter().find(|r| r["advertiser"] == "B").unwrap();
    assert_eq!(b["orderCount"], 0);
    assert_eq!(b["roi"], 0.0);
    assert_eq!(b["tier"], "NONE");
}

#[tokio::test]
async fn test_get_daily_uses_default_fx_rate() {
    let (app, store, _tmp) = setup_test_app(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    // No fxRate param: config default (20) applies.
    let (status, body) = get_json(app, "/daily?date=2025-08-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"][0]["roi"], 0.8);
}

#[tokio::test]
async fn test_get_daily_bad_params() {
    let (app, _store, _tmp) = setup_test_app(&["A"]).await;

    let (status, body) = get_json(app.clone(), "/daily?date=08-01-2025").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");

    let (status, body) = get_json(app.clone(), "/daily?date=2025-08-01&fxRate=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");

    let (status, body) = get_json(app, "/daily?date=2025-08-01&fxRate=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn test_get_daily_source_unavailable() {
    let (app, store, _tmp) = setup_test_app(&["A"]).await;
    store.set_failure(Some(RecordStoreError::Timeout));

    let (status, body) = get_json(app, "/daily?date=2025-08-01").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "source_unavailable");
}

#[tokio::test]
async fn test_get_available_dates() {
    let (app, store, _tmp) = setup_test_app(&["A"]).await;
    store.push_row(row("r1", "A", date(3), "100", "1600", 10));
    store.push_row(row("r2", "A", date(1), "10", "100", 1));

    let (status, body) = get_json(app, "/dates?month=2025-08").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["month"], "2025-08");
    assert_eq!(
        body["dates"],
        serde_json::json!(["2025-08-01", "2025-08-03"])
    );
}
