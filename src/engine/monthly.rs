//! Monthly rollup: fold a month of daily records into per-advertiser totals.

use crate::domain::{
    AdvertiserId, DailyCommissionRecord, Decimal, Month, MonthlyCommissionSummary,
};
use std::collections::BTreeMap;

/// Fold one advertiser's daily records into a monthly summary.
///
/// `daily` must hold that advertiser's record for every day of the target
/// range; the caller is responsible for completeness. avgROI is the mean
/// over all supplied days including zero-activity ones (an inactive day
/// drags the average down by policy), truncated to 2 decimals. workingDays
/// counts only days with orders.
pub fn rollup(
    advertiser: &AdvertiserId,
    month: Month,
    daily: &[DailyCommissionRecord],
) -> MonthlyCommissionSummary {
    let mut total_commission: i64 = 0;
    let mut total_orders: i64 = 0;
    let mut working_days: u32 = 0;
    let mut roi_sum = Decimal::zero();

    for record in daily {
        total_commission += record.total_commission;
        total_orders += record.order_count;
        if record.order_count > 0 {
            working_days += 1;
        }
        roi_sum += record.roi;
    }

    let avg_roi = if daily.is_empty() {
        Decimal::zero()
    } else {
        (roi_sum / Decimal::from(daily.len() as i64)).trunc_2()
    };

    MonthlyCommissionSummary {
        advertiser: advertiser.clone(),
        month,
        total_commission,
        total_orders,
        working_days,
        avg_roi,
    }
}

/// Roll up every advertiser appearing in the supplied daily record sets.
///
/// `daily_by_date` is one record set per day of the month (as produced by
/// the daily aggregator). Output is sorted by advertiser id.
pub fn rollup_month(
    month: Month,
    daily_by_date: &[Vec<DailyCommissionRecord>],
) -> Vec<MonthlyCommissionSummary> {
    let mut per_advertiser: BTreeMap<AdvertiserId, Vec<DailyCommissionRecord>> = BTreeMap::new();
    for day in daily_by_date {
        for record in day {
            per_advertiser
                .entry(record.advertiser.clone())
                .or_default()
                .push(record.clone());
        }
    }

    per_advertiser
        .into_iter()
        .map(|(advertiser, records)| rollup(&advertiser, month, &records))
        .collect()
}
