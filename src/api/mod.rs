pub mod daily;
pub mod dates;
pub mod health;
pub mod monthly;
pub mod recompute;

use crate::config::Config;
use crate::domain::{AdvertiserId, DailyCommissionRecord, Decimal, Tier};
use crate::error::AppError;
use crate::orchestration::{DiagnosticRecomputer, RefreshCoordinator, StalePolicy};
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub coordinator: RefreshCoordinator,
    pub diagnostic: DiagnosticRecomputer,
    pub pool: SqlitePool,
}

impl AppState {
    pub fn new(
        config: Config,
        coordinator: RefreshCoordinator,
        diagnostic: DiagnosticRecomputer,
        pool: SqlitePool,
    ) -> Self {
        Self {
            config,
            coordinator,
            diagnostic,
            pool,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/daily", get(daily::get_daily))
        .route("/monthly", get(monthly::get_monthly))
        .route("/dates", get(dates::get_available_dates))
        .route("/recompute", post(recompute::force_recompute))
        .layer(cors)
        .with_state(state)
}

/// Daily record as exposed to the dashboard: everything except the source
/// fingerprint, which stays engine-internal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecordView {
    pub advertiser: AdvertiserId,
    pub date: NaiveDate,
    pub order_count: i64,
    pub roi: Decimal,
    pub commission_per_order: i64,
    pub total_commission: i64,
    pub tier: Tier,
    pub computed_at: DateTime<Utc>,
}

impl From<DailyCommissionRecord> for DailyRecordView {
    fn from(record: DailyCommissionRecord) -> Self {
        DailyRecordView {
            advertiser: record.advertiser,
            date: record.date,
            order_count: record.order_count,
            roi: record.roi,
            commission_per_order: record.commission_per_order,
            total_commission: record.total_commission,
            tier: record.tier,
            computed_at: record.computed_at,
        }
    }
}

pub(crate) fn resolve_fx_rate(
    raw: Option<&str>,
    state: &AppState,
) -> Result<Decimal, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Decimal::from_str_canonical(s)
            .map_err(|_| AppError::BadRequest("Invalid fxRate".to_string())),
        None => Ok(state.config.default_fx_rate),
    }
}

pub(crate) fn stale_policy(allow_stale: Option<bool>) -> StalePolicy {
    if allow_stale.unwrap_or(false) {
        StalePolicy::Allow
    } else {
        StalePolicy::Refuse
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    raw.parse::<NaiveDate>()
        .map_err(|_| AppError::BadRequest("Invalid date (expected YYYY-MM-DD)".to_string()))
}

pub(crate) fn parse_month(raw: &str) -> Result<crate::domain::Month, AppError> {
    raw.parse::<crate::domain::Month>()
        .map_err(|_| AppError::BadRequest("Invalid month (expected YYYY-MM)".to_string()))
}
