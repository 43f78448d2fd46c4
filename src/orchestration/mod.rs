//! Orchestration: staleness-aware refresh and the diagnostic recompute path.

use crate::domain::Month;
use crate::engine::EngineError;
use chrono::{NaiveDate, Utc};

pub mod diagnostic;
pub mod refresh;

pub use diagnostic::{DailyDiscrepancy, DiagnosticRecomputer, MonthSnapshot, MonthlyDiscrepancy, RecomputeReport};
pub use refresh::{FreshValue, RefreshCoordinator, StalePolicy};

/// Supported date bounds. Requests outside them are rejected before any I/O.
#[derive(Debug, Clone, Copy)]
pub struct RangeBounds {
    pub min_date: NaiveDate,
}

impl RangeBounds {
    pub fn new(min_date: NaiveDate) -> Self {
        Self { min_date }
    }

    pub fn check_date(&self, date: NaiveDate) -> Result<(), EngineError> {
        let today = Utc::now().date_naive();
        if date < self.min_date || date > today {
            return Err(EngineError::InvalidRange(format!(
                "date {} outside supported range {}..={}",
                date, self.min_date, today
            )));
        }
        Ok(())
    }

    pub fn check_month(&self, month: Month) -> Result<(), EngineError> {
        let today = Utc::now().date_naive();
        if month.last_day() < self.min_date || month.first_day() > today {
            return Err(EngineError::InvalidRange(format!(
                "month {} outside supported range",
                month
            )));
        }
        Ok(())
    }

    /// Days of the month inside the supported range (never past today).
    pub fn month_days(&self, month: Month) -> Vec<NaiveDate> {
        let today = Utc::now().date_naive();
        month
            .days()
            .into_iter()
            .filter(|d| *d >= self.min_date && *d <= today)
            .collect()
    }
}

pub(crate) fn check_fx_rate(fx_rate: crate::domain::Decimal) -> Result<(), EngineError> {
    if !fx_rate.is_positive() {
        return Err(EngineError::InvalidRange(
            "fxRate must be > 0".to_string(),
        ));
    }
    Ok(())
}
