//! `POST /api/scan`: analyze one captured image.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::MedicineRecord;
use crate::pipeline::{ImagePayload, Resolution};

#[derive(Deserialize)]
pub struct ScanRequest {
    /// Data URL or bare base64.
    pub image: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanResponse {
    Ok {
        scan_id: Uuid,
        record: MedicineRecord,
        demo: bool,
    },
    Error {
        scan_id: Uuid,
        code: &'static str,
        message: String,
    },
}

pub async fn scan(
    State(ctx): State<ApiContext>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let image =
        ImagePayload::from_encoded(&req.image).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // The persistence task is left running on its own.
    let report = ctx.pipeline.run(&image).await;

    let response = match report.resolution {
        Resolution::Display { record, persist } => ScanResponse::Ok {
            scan_id: report.scan_id,
            record,
            demo: !persist,
        },
        Resolution::ShowError { kind, message } => ScanResponse::Error {
            scan_id: report.scan_id,
            code: kind.code(),
            message,
        },
    };
    Ok(Json(response))
}
