//! `GET /api/scans`: recently saved scans, newest first.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use crate::models::ScanRow;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ScanRow>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be at least 1".into()));
    }

    let rows = ctx.sink().recent(limit.min(MAX_HISTORY_LIMIT)).await?;
    Ok(Json(rows))
}
