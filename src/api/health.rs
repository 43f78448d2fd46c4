use crate::api::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness: the cache database must answer a trivial query.
pub async fn ready(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let _: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&state.pool).await?;
    Ok(Json(json!({ "status": "ready" })))
}
