use adcomm::api::{self, AppState};
use adcomm::cache::CacheLayer;
use adcomm::config::Config;
use adcomm::db::init_db;
use adcomm::domain::{AdvertiserId, Decimal, RawActivityRecord};
use adcomm::orchestration::{DiagnosticRecomputer, RangeBounds, RefreshCoordinator};
use adcomm::recordstore::{MockRecordStore, StaticRoster};
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

async fn request_json(
    app: axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, serde_json::Value) {
    let request = axum::http::Request::builder()
        .method(method)
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
async fn test_force_recompute_reports_drift() {
    let (app, store, _tmp) = setup_test_app(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    // Warm the cache through the normal path.
    let (status, _) = request_json(app.clone(), "GET", "/monthly?month=2025-08").await;
    assert_eq!(status, StatusCode::OK);

    // Upstream edit the cache has not observed yet.
    let mut edited = row("r1", "A", date(1), "100", "1600", 10);
    edited.order_count = 20;
    store.update_row(edited);

    let (status, body) =
        request_json(app.clone(), "POST", "/recompute?month=2025-08&fxRate=20").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["month"], "2025-08");

    let discrepancies = body["discrepancies"].as_array().unwrap();
    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0]["advertiser"], "A");
    assert_eq!(discrepancies[0]["date"], "2025-08-01");
    assert_eq!(discrepancies[0]["cachedTotalCommission"], 50);
    assert_eq!(discrepancies[0]["freshTotalCommission"], 100);

    let monthly_discrepancies = body["monthlyDiscrepancies"].as_array().unwrap();
    assert_eq!(monthly_discrepancies.len(), 1);
    assert_eq!(monthly_discrepancies[0]["freshTotalCommission"], 100);

    // The after snapshot reflects the fresh derivation.
    let after_monthly = body["after"]["monthly"].as_array().unwrap();
    assert_eq!(after_monthly[0]["totalCommission"], 100);

    // Fingerprints stay engine-internal even in diagnostics.
    let after_daily = body["after"]["daily"].as_array().unwrap();
    assert!(after_daily[0].get("sourceFingerprint").is_none());
}

#[tokio::test]
async fn test_force_recompute_is_idempotent() {
    let (app, store, _tmp) = setup_test_app(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let (status, first) =
        request_json(app.clone(), "POST", "/recompute?month=2025-08").await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) =
        request_json(app.clone(), "POST", "/recompute?month=2025-08").await;
    assert_eq!(status, StatusCode::OK);

    assert!(second["discrepancies"].as_array().unwrap().is_empty());
    assert!(second["monthlyDiscrepancies"]
        .as_array()
        .unwrap()
        .is_empty());
    // Unchanged data: the second run reproduces the first exactly,
    // timestamps included.
    assert_eq!(first["after"], second["after"]);
}

#[tokio::test]
async fn test_force_recompute_bad_month() {
    let (app, _store, _tmp) = setup_test_app(&["A"]).await;
    let (status, body) = request_json(app, "POST", "/recompute?month=notamonth").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
}
