use adcomm::cache::{CacheKey, CacheLayer};
use adcomm::db::init_db;
use adcomm::domain::{AdvertiserId, Decimal, Month, RawActivityRecord, Tier};
use adcomm::engine::EngineError;
use adcomm::orchestration::{RangeBounds, RefreshCoordinator, StalePolicy};
use adcomm::recordstore::{MockRecordStore, RecordStoreError, StaticRoster};
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tempfile::TempDir;

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

async fn setup(
    advertisers: &[&str],
) -> (RefreshCoordinator, Arc<MockRecordStore>, CacheLayer, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let cache = CacheLayer::new(pool);

    let store = Arc::new(MockRecordStore::new());
    let roster = Arc::new(StaticRoster::new(
        advertisers.iter().map(|a| AdvertiserId::new(*a)).collect(),
    ));
    let bounds = RangeBounds::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    let coordinator = RefreshCoordinator::new(store.clone(), roster, cache.clone(), bounds);
    (coordinator, store, cache, temp_dir)
}

#[tokio::test]
async fn test_cold_cache_computes_and_caches() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let records = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].roi, dec("0.80"));
    assert_eq!(records[0].tier, Tier::Qualified);
    assert_eq!(records[0].total_commission, 50);
    assert_eq!(store.fetch_count(), 1);
    // A miss goes straight to full aggregation, no probe first.
    assert_eq!(store.fingerprint_count(), 0);
}

#[tokio::test]
async fn test_second_call_serves_cache_without_recompute() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let first = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();
    let second = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();

    assert_eq!(first, second);
    // One full aggregation, then one cheap probe.
    assert_eq!(store.fetch_count(), 1);
    assert_eq!(store.fingerprint_count(), 1);
}

#[tokio::test]
async fn test_source_mutation_triggers_recompute() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let first = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();
    assert_eq!(first[0].total_commission, 50);

    // Upstream edit: a second row lands on the same date.
    store.push_row(row("r2", "A", date(1), "50", "1100", 5));

    let second = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();
    // Summed before evaluation: (2700/20)/150 = 0.90
    assert_eq!(second[0].roi, dec("0.90"));
    assert_eq!(second[0].order_count, 15);
    assert_eq!(second[0].total_commission, 75);
    assert_eq!(store.fetch_count(), 2);
}

#[tokio::test]
async fn test_concurrent_calls_coalesce_to_one_aggregation() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let calls = (0..8).map(|_| {
        let coordinator = coordinator.clone();
        async move {
            coordinator
                .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
                .await
        }
    });
    let results = futures::future::join_all(calls).await;

    let first = results[0].as_ref().unwrap().clone();
    for result in &results {
        assert_eq!(result.as_ref().unwrap(), &first);
    }
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test]
async fn test_cascade_invalidates_cached_month() {
    let (coordinator, store, cache, _tmp) = setup(&["A"]).await;
    let month: Month = "2025-08".parse().unwrap();
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let summaries = coordinator
        .ensure_fresh_monthly(month, dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();
    assert_eq!(summaries[0].total_commission, 50);

    // Mutate a date inside the cached month, then refresh that date.
    store.push_row(row("r2", "A", date(1), "50", "1100", 5));
    coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();

    let entry = cache
        .get(&CacheKey::monthly(month))
        .await
        .unwrap()
        .expect("monthly entry should still exist");
    assert!(entry.invalidated, "monthly entry must be cascade-invalidated");

    let refreshed = coordinator
        .ensure_fresh_monthly(month, dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();
    assert_eq!(refreshed[0].total_commission, 75);
}

#[tokio::test]
async fn test_source_failure_is_not_cached_as_zero() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));
    store.set_failure(Some(RecordStoreError::Timeout));

    let err = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SourceUnavailable(_)));

    // Recovery: nothing was cached, so the next call aggregates for real.
    store.set_failure(None);
    let records = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();
    assert_eq!(records[0].total_commission, 50);
    assert_eq!(store.fingerprint_count(), 0);
}

#[tokio::test]
async fn test_stale_serving_is_explicit_opt_in() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let cached = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();

    store.set_failure(Some(RecordStoreError::Network("down".to_string())));

    // Default: surface the error.
    let err = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Refuse)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SourceUnavailable(_)));

    // Explicit opt-in: serve the last good value.
    let stale = coordinator
        .ensure_fresh_daily(date(1), dec("20"), StalePolicy::Allow)
        .await
        .unwrap();
    assert_eq!(stale, cached);
}

#[tokio::test]
async fn test_invalid_range_rejected_before_io() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;

    let future_date = Utc::now().date_naive() + Duration::days(1);
    let err = coordinator
        .ensure_fresh_daily(future_date, dec("20"), StalePolicy::Refuse)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange(_)));

    let before_min = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    let err = coordinator
        .ensure_fresh_daily(before_min, dec("20"), StalePolicy::Refuse)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange(_)));

    let err = coordinator
        .ensure_fresh_daily(date(1), Decimal::zero(), StalePolicy::Refuse)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange(_)));

    assert_eq!(store.fetch_count(), 0);
    assert_eq!(store.fingerprint_count(), 0);
}

#[tokio::test]
async fn test_monthly_serves_cache_when_unchanged() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;
    let month: Month = "2025-08".parse().unwrap();
    store.push_row(row("r1", "A", date(1), "100", "1600", 10));

    let first = coordinator
        .ensure_fresh_monthly(month, dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();
    let fetches_after_first = store.fetch_count();

    let second = coordinator
        .ensure_fresh_monthly(month, dec("20"), StalePolicy::Refuse)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(store.fetch_count(), fetches_after_first);
}

#[tokio::test]
async fn test_available_dates() {
    let (coordinator, store, _cache, _tmp) = setup(&["A"]).await;
    let month: Month = "2025-08".parse().unwrap();
    store.push_row(row("r1", "A", date(3), "100", "1600", 10));
    store.push_row(row("r2", "A", date(1), "10", "100", 1));
    store.push_row(row("r3", "A", date(1), "20", "300", 2));

    let dates = coordinator.available_dates(month).await.unwrap();
    assert_eq!(dates, vec![date(1), date(3)]);
}
