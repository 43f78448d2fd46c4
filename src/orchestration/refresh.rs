//! Staleness detection and debounced refresh.
//!
//! `ensure_fresh_*` never silently returns stale data: a cache hit is only
//! served after a cheap fingerprint probe against the record store confirms
//! the underlying rows are unchanged. Concurrent calls for the same key
//! coalesce onto a single in-flight recomputation; later callers await the
//! shared result. The recomputation is spawned, so a caller abandoning its
//! request never cancels work other callers depend on.

use crate::cache::{CacheEntry, CacheKey, CacheLayer};
use crate::domain::{DailyCommissionRecord, Decimal, Month, MonthlyCommissionSummary};
use crate::engine::{fingerprint_rows, monthly, DailyAggregator, EngineError};
use crate::orchestration::{check_fx_rate, RangeBounds};
use crate::recordstore::{AdvertiserRoster, RecordStore};
use chrono::{NaiveDate, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// What to do when the store is unreachable but a cached value exists.
///
/// The engine defaults to surfacing the error; serving stale is an explicit
/// caller opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
    #[default]
    Refuse,
    Allow,
}

/// A freshly ensured value, one variant per cache scope.
#[derive(Debug, Clone)]
pub enum FreshValue {
    Daily(Vec<DailyCommissionRecord>),
    Monthly(Vec<MonthlyCommissionSummary>),
}

#[derive(Debug, Clone, Copy)]
enum RefreshJob {
    Daily(NaiveDate),
    Monthly(Month),
}

type SharedRefresh = Shared<BoxFuture<'static, Result<FreshValue, EngineError>>>;

struct Inner {
    store: Arc<dyn RecordStore>,
    roster: Arc<dyn AdvertiserRoster>,
    aggregator: DailyAggregator,
    cache: CacheLayer,
    bounds: RangeBounds,
    in_flight: Mutex<HashMap<CacheKey, SharedRefresh>>,
}

/// Refresh coordinator: the only writer of cache entries during normal
/// operation. Cheap to clone.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        roster: Arc<dyn AdvertiserRoster>,
        cache: CacheLayer,
        bounds: RangeBounds,
    ) -> Self {
        let aggregator = DailyAggregator::new(store.clone(), roster.clone());
        Self {
            inner: Arc::new(Inner {
                store,
                roster,
                aggregator,
                cache,
                bounds,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Return fresh daily records for a date, recomputing only when the
    /// source fingerprint no longer matches the cached one.
    pub async fn ensure_fresh_daily(
        &self,
        date: NaiveDate,
        fx_rate: Decimal,
        policy: StalePolicy,
    ) -> Result<Vec<DailyCommissionRecord>, EngineError> {
        self.inner.bounds.check_date(date)?;
        check_fx_rate(fx_rate)?;

        match self
            .coalesce(CacheKey::daily(date), RefreshJob::Daily(date), fx_rate, policy)
            .await?
        {
            FreshValue::Daily(records) => Ok(records),
            FreshValue::Monthly(_) => Err(EngineError::Internal(
                "daily key resolved to monthly value".to_string(),
            )),
        }
    }

    /// Return fresh monthly summaries, recomputing when the month-range
    /// fingerprint changed or the entry was cascade-invalidated.
    pub async fn ensure_fresh_monthly(
        &self,
        month: Month,
        fx_rate: Decimal,
        policy: StalePolicy,
    ) -> Result<Vec<MonthlyCommissionSummary>, EngineError> {
        self.inner.bounds.check_month(month)?;
        check_fx_rate(fx_rate)?;

        match self
            .coalesce(
                CacheKey::monthly(month),
                RefreshJob::Monthly(month),
                fx_rate,
                policy,
            )
            .await?
        {
            FreshValue::Monthly(summaries) => Ok(summaries),
            FreshValue::Daily(_) => Err(EngineError::Internal(
                "monthly key resolved to daily value".to_string(),
            )),
        }
    }

    /// Dates of the month that have at least one raw row.
    pub async fn available_dates(&self, month: Month) -> Result<Vec<NaiveDate>, EngineError> {
        self.inner.bounds.check_month(month)?;
        let days = self.inner.bounds.month_days(month);
        let (Some(first), Some(last)) = (days.first(), days.last()) else {
            return Ok(Vec::new());
        };

        let rows = self
            .inner
            .store
            .fetch_raw_records(*first, *last)
            .await
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?;

        let dates: BTreeSet<NaiveDate> = rows.into_iter().map(|r| r.date).collect();
        Ok(dates.into_iter().collect())
    }

    /// Coalesce concurrent refreshes of the same key onto one spawned task.
    async fn coalesce(
        &self,
        key: CacheKey,
        job: RefreshJob,
        fx_rate: Decimal,
        policy: StalePolicy,
    ) -> Result<FreshValue, EngineError> {
        let shared = {
            let mut map = self.inner.in_flight.lock().unwrap();
            if let Some(existing) = map.get(&key) {
                debug!(%key, "joining in-flight refresh");
                existing.clone()
            } else {
                let inner = self.inner.clone();
                let task_key = key.clone();
                // Spawned so an abandoned caller cannot cancel the refresh.
                // The task unregisters itself only after the work finished,
                // keeping at most one live recomputation per key.
                let task = tokio::spawn(async move {
                    let result = Inner::refresh(&inner, &task_key, job, fx_rate, policy).await;
                    inner.in_flight.lock().unwrap().remove(&task_key);
                    result
                });
                let shared: SharedRefresh = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => Err(EngineError::Internal(format!("refresh task failed: {e}"))),
                    }
                }
                .boxed()
                .shared();
                map.insert(key.clone(), shared.clone());
                shared
            }
        };

        shared.await
    }
}

impl Inner {
    async fn refresh(
        inner: &Arc<Inner>,
        key: &CacheKey,
        job: RefreshJob,
        fx_rate: Decimal,
        policy: StalePolicy,
    ) -> Result<FreshValue, EngineError> {
        match job {
            RefreshJob::Daily(date) => inner.refresh_daily(key, date, fx_rate, policy).await,
            RefreshJob::Monthly(month) => inner.refresh_monthly(key, month, fx_rate, policy).await,
        }
    }

    async fn refresh_daily(
        &self,
        key: &CacheKey,
        date: NaiveDate,
        fx_rate: Decimal,
        policy: StalePolicy,
    ) -> Result<FreshValue, EngineError> {
        let entry = self.cache.get(key).await.map_err(cache_error)?;

        if let Some(entry) = entry.as_ref().filter(|e| !e.invalidated) {
            match self.store.fetch_fingerprint(date, date).await {
                Ok(probe) if probe == entry.fingerprint => {
                    debug!(%key, "fingerprint unchanged, serving cached value");
                    return decode_daily(entry);
                }
                Ok(_) => {
                    info!(%key, "source fingerprint changed, recomputing");
                }
                Err(e) => {
                    if policy == StalePolicy::Allow {
                        warn!(%key, error = %e, "probe failed, serving stale by request");
                        return decode_daily(entry);
                    }
                    return Err(EngineError::SourceUnavailable(e.to_string()));
                }
            }
        }

        let aggregation = match self.aggregator.aggregate(date, fx_rate).await {
            Ok(aggregation) => aggregation,
            Err(EngineError::SourceUnavailable(msg)) => {
                if policy == StalePolicy::Allow {
                    if let Some(entry) = entry.as_ref().filter(|e| !e.invalidated) {
                        warn!(%key, "recompute failed, serving stale by request");
                        return decode_daily(entry);
                    }
                }
                return Err(EngineError::SourceUnavailable(msg));
            }
            Err(e) => return Err(e),
        };

        let value_json =
            serde_json::to_string(&aggregation.records).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.cache
            .put(key, &value_json, &aggregation.fingerprint)
            .await
            .map_err(cache_error)?;

        // A changed day makes any cached month containing it stale.
        if entry.is_some() {
            let monthly_key = CacheKey::monthly(Month::containing(date));
            self.cache.invalidate(&monthly_key).await.map_err(cache_error)?;
            debug!(%monthly_key, "cascade-invalidated containing month");
        }

        Ok(FreshValue::Daily(aggregation.records))
    }

    async fn refresh_monthly(
        &self,
        key: &CacheKey,
        month: Month,
        fx_rate: Decimal,
        policy: StalePolicy,
    ) -> Result<FreshValue, EngineError> {
        let days = self.bounds.month_days(month);
        let (Some(first), Some(last)) = (days.first().copied(), days.last().copied()) else {
            return Ok(FreshValue::Monthly(Vec::new()));
        };

        let entry = self.cache.get(key).await.map_err(cache_error)?;

        if let Some(entry) = entry.as_ref().filter(|e| !e.invalidated) {
            match self.store.fetch_fingerprint(first, last).await {
                Ok(probe) if probe == entry.fingerprint => {
                    debug!(%key, "fingerprint unchanged, serving cached value");
                    return decode_monthly(entry);
                }
                Ok(_) => {
                    info!(%key, "source fingerprint changed, recomputing");
                }
                Err(e) => {
                    if policy == StalePolicy::Allow {
                        warn!(%key, error = %e, "probe failed, serving stale by request");
                        return decode_monthly(entry);
                    }
                    return Err(EngineError::SourceUnavailable(e.to_string()));
                }
            }
        }

        let result = self.recompute_month(&days, first, last, fx_rate).await;
        let (daily_sets, month_fingerprint) = match result {
            Ok(v) => v,
            Err(EngineError::SourceUnavailable(msg)) => {
                if policy == StalePolicy::Allow {
                    if let Some(entry) = entry.as_ref().filter(|e| !e.invalidated) {
                        warn!(%key, "recompute failed, serving stale by request");
                        return decode_monthly(entry);
                    }
                }
                return Err(EngineError::SourceUnavailable(msg));
            }
            Err(e) => return Err(e),
        };

        let summaries = monthly::rollup_month(month, &daily_sets);
        let value_json =
            serde_json::to_string(&summaries).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.cache
            .put(key, &value_json, &month_fingerprint)
            .await
            .map_err(cache_error)?;

        Ok(FreshValue::Monthly(summaries))
    }

    /// Recompute every day of the month from one range fetch, refreshing the
    /// daily cache entries along the way so daily and monthly reads agree.
    async fn recompute_month(
        &self,
        days: &[NaiveDate],
        first: NaiveDate,
        last: NaiveDate,
        fx_rate: Decimal,
    ) -> Result<(Vec<Vec<DailyCommissionRecord>>, String), EngineError> {
        let advertisers = self
            .roster
            .list_advertisers()
            .await
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?;
        let rows = self
            .store
            .fetch_raw_records(first, last)
            .await
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?;

        let month_fingerprint = fingerprint_rows(&rows);
        let computed_at = Utc::now();
        let mut daily_sets = Vec::with_capacity(days.len());

        for day in days {
            let records =
                DailyAggregator::build_records(&advertisers, *day, &rows, fx_rate, computed_at);
            let day_rows: Vec<_> = rows.iter().filter(|r| r.date == *day).cloned().collect();
            let day_fingerprint = fingerprint_rows(&day_rows);
            let value_json =
                serde_json::to_string(&records).map_err(|e| EngineError::Internal(e.to_string()))?;
            self.cache
                .put(&CacheKey::daily(*day), &value_json, &day_fingerprint)
                .await
                .map_err(cache_error)?;
            daily_sets.push(records);
        }

        Ok((daily_sets, month_fingerprint))
    }
}

fn decode_daily(entry: &CacheEntry) -> Result<FreshValue, EngineError> {
    serde_json::from_str::<Vec<DailyCommissionRecord>>(&entry.value_json)
        .map(FreshValue::Daily)
        .map_err(|e| EngineError::Internal(format!("corrupt daily cache entry: {e}")))
}

fn decode_monthly(entry: &CacheEntry) -> Result<FreshValue, EngineError> {
    serde_json::from_str::<Vec<MonthlyCommissionSummary>>(&entry.value_json)
        .map(FreshValue::Monthly)
        .map_err(|e| EngineError::Internal(format!("corrupt monthly cache entry: {e}")))
}

fn cache_error(e: sqlx::Error) -> EngineError {
    EngineError::Cache(e.to_string())
}
