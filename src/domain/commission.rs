//! Derived commission types: tiers, daily records, monthly summaries.

use crate::domain::{AdvertiserId, Decimal, Month};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Commission bracket determined by a day's ROI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// ROI below 0.80, or no activity. No commission.
    #[default]
    None,
    /// 0.80 <= ROI < 1.00. 5 money units per order.
    Qualified,
    /// ROI >= 1.00. 7 money units per order.
    High,
}

impl Tier {
    /// Commission per order for this tier, in whole money units.
    pub fn commission_per_order(&self) -> i64 {
        match self {
            Tier::None => 0,
            Tier::Qualified => 5,
            Tier::High => 7,
        }
    }
}

/// Per-advertiser commission result for one calendar day.
///
/// `total_commission` is always `order_count * commission_per_order`; a day
/// with no activity is a real record with ROI 0 and tier NONE, never an
/// omission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCommissionRecord {
    pub advertiser: AdvertiserId,
    pub date: NaiveDate,
    pub order_count: i64,
    /// ROI truncated (not rounded) to 2 decimals.
    pub roi: Decimal,
    pub commission_per_order: i64,
    pub total_commission: i64,
    pub tier: Tier,
    /// When this record was computed. The only cache metadata the UI sees.
    pub computed_at: DateTime<Utc>,
    /// Hash of the raw rows that produced this record. Engine-internal;
    /// stripped from API responses.
    pub source_fingerprint: String,
}

/// Per-advertiser rollup of one month of daily commission records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCommissionSummary {
    pub advertiser: AdvertiserId,
    pub month: Month,
    /// Sum of the month's daily total_commission values.
    pub total_commission: i64,
    pub total_orders: i64,
    /// Count of days with order_count > 0.
    pub working_days: u32,
    /// Mean of daily ROI across every day in range (zero-activity days
    /// included), truncated to 2 decimals.
    pub avg_roi: Decimal,
}
