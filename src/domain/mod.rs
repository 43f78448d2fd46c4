//! Domain types for the commission aggregation engine.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper (2-decimal truncation)
//! - Domain primitives: AdvertiserId, Month
//! - Raw activity rows and derived daily/monthly commission types

pub mod activity;
pub mod commission;
pub mod decimal;
pub mod primitives;

pub use activity::RawActivityRecord;
pub use commission::{DailyCommissionRecord, MonthlyCommissionSummary, Tier};
pub use decimal::Decimal;
pub use primitives::{AdvertiserId, Month, MonthParseError};
