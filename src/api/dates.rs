use crate::api::{parse_month, AppState};
use crate::domain::Month;
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatesQuery {
    pub month: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatesResponse {
    pub month: Month,
    /// Dates with at least one raw activity row.
    pub dates: Vec<NaiveDate>,
}

pub async fn get_available_dates(
    Query(params): Query<DatesQuery>,
    State(state): State<AppState>,
) -> Result<Json<DatesResponse>, AppError> {
    let month = parse_month(&params.month)?;
    let dates = state.coordinator.available_dates(month).await?;
    Ok(Json(DatesResponse { month, dates }))
}
