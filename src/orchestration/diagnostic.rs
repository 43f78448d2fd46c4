//! Diagnostic recompute: bypass the cache, re-derive a whole month from the
//! record store, swap the cache atomically, and report every place the
//! cached values had drifted.
//!
//! Replaces debugging-by-log-scraping with a structured before/after report
//! an operator (or a test) can assert on.

use crate::cache::{CacheKey, CacheLayer};
use crate::domain::{
    AdvertiserId, DailyCommissionRecord, Decimal, Month, MonthlyCommissionSummary,
};
use crate::engine::{fingerprint_rows, monthly, DailyAggregator, EngineError};
use crate::orchestration::{check_fx_rate, RangeBounds};
use crate::recordstore::{AdvertiserRoster, RecordStore};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything cached (or freshly derived) for one month.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonthSnapshot {
    pub daily: Vec<DailyCommissionRecord>,
    pub monthly: Vec<MonthlyCommissionSummary>,
}

/// A cached daily value that no longer matches the source-derived one.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyDiscrepancy {
    pub advertiser: AdvertiserId,
    pub date: NaiveDate,
    pub cached_total_commission: i64,
    pub fresh_total_commission: i64,
    pub cached_roi: Decimal,
    pub fresh_roi: Decimal,
}

/// A cached monthly summary that no longer matches the source-derived one.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyDiscrepancy {
    pub advertiser: AdvertiserId,
    pub cached_total_commission: i64,
    pub fresh_total_commission: i64,
}

/// Result of one forced recompute.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeReport {
    pub month: Month,
    pub before: MonthSnapshot,
    pub after: MonthSnapshot,
    pub discrepancies: Vec<DailyDiscrepancy>,
    pub monthly_discrepancies: Vec<MonthlyDiscrepancy>,
}

/// Operator-facing forced recompute over a whole month.
#[derive(Clone)]
pub struct DiagnosticRecomputer {
    store: Arc<dyn RecordStore>,
    roster: Arc<dyn AdvertiserRoster>,
    cache: CacheLayer,
    bounds: RangeBounds,
}

impl DiagnosticRecomputer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        roster: Arc<dyn AdvertiserRoster>,
        cache: CacheLayer,
        bounds: RangeBounds,
    ) -> Self {
        Self {
            store,
            roster,
            cache,
            bounds,
        }
    }

    /// Re-derive every daily and monthly value for the month straight from
    /// the record store, atomically replace the month's cache contents, and
    /// report each (advertiser, date) whose cached value differed.
    ///
    /// Idempotent: with unchanged source data a second run reports no
    /// discrepancies and produces an identical `after` snapshot (unchanged
    /// records keep their original `computed_at`).
    ///
    /// If a first pass finds discrepancies, a second independent pass must
    /// reproduce the first; disagreement between the two passes means the
    /// source itself is churning mid-diagnosis and surfaces as
    /// `ConsistencyViolation` rather than being papered over.
    pub async fn force_recompute(
        &self,
        month: Month,
        fx_rate: Decimal,
    ) -> Result<RecomputeReport, EngineError> {
        self.bounds.check_month(month)?;
        check_fx_rate(fx_rate)?;

        let days = self.bounds.month_days(month);
        info!(%month, days = days.len(), "forced recompute requested");

        let before = self.snapshot_cached(month, &days).await?;

        let first_pass = self.compute_month(&days, fx_rate).await?;
        let MonthComputation {
            mut daily_sets,
            day_fingerprints,
            month_fingerprint,
        } = first_pass;
        let summaries = monthly::rollup_month(month, &daily_sets);

        let cached_daily = index_daily(&before.daily);
        preserve_timestamps(&mut daily_sets, &cached_daily);
        let discrepancies = daily_discrepancies(&daily_sets, &cached_daily);
        let monthly_discrepancies = monthly_discrepancies(&summaries, &before.monthly);

        if !discrepancies.is_empty() || !monthly_discrepancies.is_empty() {
            warn!(
                %month,
                daily = discrepancies.len(),
                monthly = monthly_discrepancies.len(),
                "cache drift detected, running verification pass"
            );
            let verify = self.compute_month(&days, fx_rate).await?;
            if verify.month_fingerprint != month_fingerprint
                || !sets_equivalent(&daily_sets, &verify.daily_sets)
            {
                return Err(EngineError::ConsistencyViolation(format!(
                    "verification pass for {} disagreed with the first recompute; \
                     source data is changing during diagnosis",
                    month
                )));
            }
        }

        let mut daily_entries = Vec::with_capacity(days.len());
        for ((day, records), fingerprint) in
            days.iter().zip(daily_sets.iter()).zip(day_fingerprints)
        {
            let value_json = serde_json::to_string(records)
                .map_err(|e| EngineError::Internal(e.to_string()))?;
            daily_entries.push((*day, value_json, fingerprint));
        }
        let monthly_json =
            serde_json::to_string(&summaries).map_err(|e| EngineError::Internal(e.to_string()))?;
        self.cache
            .replace_month(month, &daily_entries, &monthly_json, &month_fingerprint)
            .await
            .map_err(|e| EngineError::Cache(e.to_string()))?;

        Ok(RecomputeReport {
            month,
            before,
            after: MonthSnapshot {
                daily: daily_sets.into_iter().flatten().collect(),
                monthly: summaries,
            },
            discrepancies,
            monthly_discrepancies,
        })
    }

    async fn snapshot_cached(
        &self,
        month: Month,
        days: &[NaiveDate],
    ) -> Result<MonthSnapshot, EngineError> {
        let mut daily = Vec::new();
        for day in days {
            if let Some(entry) = self
                .cache
                .get(&CacheKey::daily(*day))
                .await
                .map_err(|e| EngineError::Cache(e.to_string()))?
            {
                let records: Vec<DailyCommissionRecord> =
                    serde_json::from_str(&entry.value_json)
                        .map_err(|e| EngineError::Internal(format!("corrupt cache entry: {e}")))?;
                daily.extend(records);
            }
        }

        let monthly = match self
            .cache
            .get(&CacheKey::monthly(month))
            .await
            .map_err(|e| EngineError::Cache(e.to_string()))?
        {
            Some(entry) => serde_json::from_str(&entry.value_json)
                .map_err(|e| EngineError::Internal(format!("corrupt cache entry: {e}")))?,
            None => Vec::new(),
        };

        Ok(MonthSnapshot { daily, monthly })
    }

    /// One range fetch, then pure per-day construction. Never touches cache.
    /// Per-day fingerprints use the same canonical hash as the daily refresh
    /// path, so entries written here stay probe-compatible.
    async fn compute_month(
        &self,
        days: &[NaiveDate],
        fx_rate: Decimal,
    ) -> Result<MonthComputation, EngineError> {
        let (Some(first), Some(last)) = (days.first().copied(), days.last().copied()) else {
            return Ok(MonthComputation {
                daily_sets: Vec::new(),
                day_fingerprints: Vec::new(),
                month_fingerprint: fingerprint_rows(&[]),
            });
        };

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
        let mut day_fingerprints = Vec::with_capacity(days.len());
        for day in days {
            daily_sets.push(DailyAggregator::build_records(
                &advertisers,
                *day,
                &rows,
                fx_rate,
                computed_at,
            ));
            let day_rows: Vec<_> = rows.iter().filter(|r| r.date == *day).cloned().collect();
            day_fingerprints.push(fingerprint_rows(&day_rows));
        }
        Ok(MonthComputation {
            daily_sets,
            day_fingerprints,
            month_fingerprint,
        })
    }
}

struct MonthComputation {
    daily_sets: Vec<Vec<DailyCommissionRecord>>,
    day_fingerprints: Vec<String>,
    month_fingerprint: String,
}

fn index_daily(
    records: &[DailyCommissionRecord],
) -> HashMap<(AdvertiserId, NaiveDate), DailyCommissionRecord> {
    records
        .iter()
        .map(|r| ((r.advertiser.clone(), r.date), r.clone()))
        .collect()
}

/// Records identical to their cached counterpart keep the cached
/// `computed_at`, making repeated recomputes byte-stable.
fn preserve_timestamps(
    sets: &mut [Vec<DailyCommissionRecord>],
    cached: &HashMap<(AdvertiserId, NaiveDate), DailyCommissionRecord>,
) {
    for records in sets.iter_mut() {
        for record in records.iter_mut() {
            if let Some(prev) = cached.get(&(record.advertiser.clone(), record.date)) {
                if records_match(record, prev) {
                    record.computed_at = prev.computed_at;
                }
            }
        }
    }
}

fn records_match(a: &DailyCommissionRecord, b: &DailyCommissionRecord) -> bool {
    a.order_count == b.order_count
        && a.roi == b.roi
        && a.commission_per_order == b.commission_per_order
        && a.total_commission == b.total_commission
        && a.tier == b.tier
        && a.source_fingerprint == b.source_fingerprint
}

fn sets_equivalent(a: &[Vec<DailyCommissionRecord>], b: &[Vec<DailyCommissionRecord>]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| {
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|(r, s)| {
                    r.advertiser == s.advertiser && r.date == s.date && records_match(r, s)
                })
        })
}

fn daily_discrepancies(
    fresh_sets: &[Vec<DailyCommissionRecord>],
    cached: &HashMap<(AdvertiserId, NaiveDate), DailyCommissionRecord>,
) -> Vec<DailyDiscrepancy> {
    let mut out = Vec::new();
    for records in fresh_sets {
        for fresh in records {
            let Some(prev) = cached.get(&(fresh.advertiser.clone(), fresh.date)) else {
                continue;
            };
            if !records_match(fresh, prev) {
                out.push(DailyDiscrepancy {
                    advertiser: fresh.advertiser.clone(),
                    date: fresh.date,
                    cached_total_commission: prev.total_commission,
                    fresh_total_commission: fresh.total_commission,
                    cached_roi: prev.roi,
                    fresh_roi: fresh.roi,
                });
            }
        }
    }
    out
}

fn monthly_discrepancies(
    fresh: &[MonthlyCommissionSummary],
    cached: &[MonthlyCommissionSummary],
) -> Vec<MonthlyDiscrepancy> {
    let cached_by_adv: HashMap<&AdvertiserId, &MonthlyCommissionSummary> =
        cached.iter().map(|s| (&s.advertiser, s)).collect();
    let mut out = Vec::new();
    for summary in fresh {
        let Some(prev) = cached_by_adv.get(&summary.advertiser) else {
            continue;
        };
        if summary.total_commission != prev.total_commission
            || summary.total_orders != prev.total_orders
            || summary.working_days != prev.working_days
            || summary.avg_roi != prev.avg_roi
        {
            out.push(MonthlyDiscrepancy {
                advertiser: summary.advertiser.clone(),
                cached_total_commission: prev.total_commission,
                fresh_total_commission: summary.total_commission,
            });
        }
    }
    out
}
