//! Daily aggregation: raw rows -> one commission record per advertiser.

use crate::domain::{AdvertiserId, DailyCommissionRecord, Decimal, RawActivityRecord};
use crate::engine::fingerprint::fingerprint_rows;
use crate::engine::rules;
use crate::engine::EngineError;
use crate::recordstore::{AdvertiserRoster, RecordStore};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Result of one daily aggregation pass.
#[derive(Debug, Clone)]
pub struct DailyAggregation {
    /// One record per advertiser, sorted by advertiser id.
    pub records: Vec<DailyCommissionRecord>,
    /// Fingerprint over every raw row for the date, comparable with the
    /// record store's cheap fingerprint probe.
    pub fingerprint: String,
}

/// Aggregates raw activity rows into daily commission records.
pub struct DailyAggregator {
    store: Arc<dyn RecordStore>,
    roster: Arc<dyn AdvertiserRoster>,
}

impl DailyAggregator {
    pub fn new(store: Arc<dyn RecordStore>, roster: Arc<dyn AdvertiserRoster>) -> Self {
        Self { store, roster }
    }

    /// Aggregate one calendar day for the full roster.
    ///
    /// Fetches the day's rows once, sums per advertiser (never evaluates
    /// per-row), then applies the commission rule. Every rostered advertiser
    /// gets a record; zero raw rows yields a zero-activity record with ROI 0
    /// and tier NONE. A gateway failure propagates as `SourceUnavailable` so
    /// a false zero is never produced, let alone cached.
    pub async fn aggregate(
        &self,
        date: NaiveDate,
        fx_rate: Decimal,
    ) -> Result<DailyAggregation, EngineError> {
        let advertisers = self
            .roster
            .list_advertisers()
            .await
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?;

        let rows = self
            .store
            .fetch_raw_records(date, date)
            .await
            .map_err(|e| EngineError::SourceUnavailable(e.to_string()))?;

        debug!(%date, rows = rows.len(), advertisers = advertisers.len(), "aggregating daily commissions");

        let fingerprint = fingerprint_rows(&rows);
        let records = Self::build_records(&advertisers, date, &rows, fx_rate, Utc::now());

        Ok(DailyAggregation {
            records,
            fingerprint,
        })
    }

    /// Pure record construction over already-fetched rows.
    ///
    /// The monthly and diagnostic paths fetch a whole month in one call and
    /// build each day through here, so a month recompute costs one gateway
    /// round trip instead of thirty-one.
    pub fn build_records(
        advertisers: &[AdvertiserId],
        date: NaiveDate,
        rows: &[RawActivityRecord],
        fx_rate: Decimal,
        computed_at: chrono::DateTime<Utc>,
    ) -> Vec<DailyCommissionRecord> {
        // Group rows per advertiser; BTreeMap keeps output order stable.
        let mut groups: BTreeMap<AdvertiserId, Vec<&RawActivityRecord>> = BTreeMap::new();
        for advertiser in advertisers {
            groups.entry(advertiser.clone()).or_default();
        }
        for row in rows.iter().filter(|r| r.date == date) {
            groups.entry(row.advertiser.clone()).or_default().push(row);
        }

        groups
            .into_iter()
            .map(|(advertiser, group)| {
                let mut spend = Decimal::zero();
                let mut collected = Decimal::zero();
                let mut orders: i64 = 0;
                for row in &group {
                    spend += row.ad_spend_usd;
                    collected += row.collected_amount_local;
                    orders += row.order_count;
                }

                let owned: Vec<RawActivityRecord> = group.into_iter().cloned().collect();
                let outcome = rules::evaluate(orders, spend, collected, fx_rate);
                DailyCommissionRecord {
                    advertiser,
                    date,
                    order_count: orders,
                    roi: outcome.roi,
                    commission_per_order: outcome.commission_per_order,
                    total_commission: outcome.total_commission,
                    tier: outcome.tier,
                    computed_at,
                    source_fingerprint: fingerprint_rows(&owned),
                }
            })
            .collect()
    }
}
