use crate::api::{parse_month, resolve_fx_rate, stale_policy, AppState};
use crate::domain::{Month, MonthlyCommissionSummary};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyQuery {
    pub month: String,
    pub fx_rate: Option<String>,
    pub allow_stale: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyResponse {
    pub month: Month,
    pub summaries: Vec<MonthlyCommissionSummary>,
}

pub async fn get_monthly(
    Query(params): Query<MonthlyQuery>,
    State(state): State<AppState>,
) -> Result<Json<MonthlyResponse>, AppError> {
    let month = parse_month(&params.month)?;
    let fx_rate = resolve_fx_rate(params.fx_rate.as_deref(), &state)?;
    let policy = stale_policy(params.allow_stale);

    let summaries = state
        .coordinator
        .ensure_fresh_monthly(month, fx_rate, policy)
        .await?;

    Ok(Json(MonthlyResponse { month, summaries }))
}
