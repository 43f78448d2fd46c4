use crate::api::{parse_date, resolve_fx_rate, stale_policy, AppState, DailyRecordView};
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuery {
    pub date: String,
    pub fx_rate: Option<String>,
    pub allow_stale: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyResponse {
    pub date: NaiveDate,
    pub records: Vec<DailyRecordView>,
}

pub async fn get_daily(
    Query(params): Query<DailyQuery>,
    State(state): State<AppState>,
) -> Result<Json<DailyResponse>, AppError> {
    let date = parse_date(&params.date)?;
    let fx_rate = resolve_fx_rate(params.fx_rate.as_deref(), &state)?;
    let policy = stale_policy(params.allow_stale);

    let records = state
        .coordinator
        .ensure_fresh_daily(date, fx_rate, policy)
        .await?;

    Ok(Json(DailyResponse {
        date,
        records: records.into_iter().map(Into::into).collect(),
    }))
}
