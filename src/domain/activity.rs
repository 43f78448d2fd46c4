//! Raw activity rows as served by the external record store.

use crate::domain::{AdvertiserId, Decimal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One raw advertising-activity row for an advertiser on a calendar day.
///
/// Owned and mutated only by the external record store; the engine treats a
/// fetched batch as immutable for the duration of one aggregation pass.
/// Multiple rows may exist per (advertiser, date) and must be summed, never
/// averaged, before rule evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawActivityRecord {
    /// Stable row identifier assigned by the record store.
    pub id: String,
    /// Advertiser the spend and collections belong to.
    pub advertiser: AdvertiserId,
    /// Calendar day (no time component).
    pub date: NaiveDate,
    /// Ad spend in USD, >= 0.
    pub ad_spend_usd: Decimal,
    /// Collected payment amount in the local currency, >= 0.
    pub collected_amount_local: Decimal,
    /// Number of orders attributed to this row, >= 0.
    pub order_count: i64,
}
