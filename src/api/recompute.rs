use crate::api::{parse_month, resolve_fx_rate, AppState, DailyRecordView};
use crate::domain::{Month, MonthlyCommissionSummary};
use crate::error::AppError;
use crate::orchestration::{DailyDiscrepancy, MonthSnapshot, MonthlyDiscrepancy};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeQuery {
    pub month: String,
    pub fx_rate: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotView {
    pub daily: Vec<DailyRecordView>,
    pub monthly: Vec<MonthlyCommissionSummary>,
}

impl From<MonthSnapshot> for SnapshotView {
    fn from(snapshot: MonthSnapshot) -> Self {
        SnapshotView {
            daily: snapshot.daily.into_iter().map(Into::into).collect(),
            monthly: snapshot.monthly,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeResponse {
    pub month: Month,
    pub before: SnapshotView,
    pub after: SnapshotView,
    pub discrepancies: Vec<DailyDiscrepancy>,
    pub monthly_discrepancies: Vec<MonthlyDiscrepancy>,
}

/// Operator-triggered forced recompute of a whole month.
pub async fn force_recompute(
    Query(params): Query<RecomputeQuery>,
    State(state): State<AppState>,
) -> Result<Json<RecomputeResponse>, AppError> {
    let month = parse_month(&params.month)?;
    let fx_rate = resolve_fx_rate(params.fx_rate.as_deref(), &state)?;

    let report = state.diagnostic.force_recompute(month, fx_rate).await?;

    Ok(Json(RecomputeResponse {
        month: report.month,
        before: report.before.into(),
        after: report.after.into(),
        discrepancies: report.discrepancies,
        monthly_discrepancies: report.monthly_discrepancies,
    }))
}
