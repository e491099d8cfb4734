use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::dto::{AsyncDownloadResponse, DownloadRequest, DownloadResponse, StatusResponse};
use super::model::Job;
use crate::common::error::AppError;
use crate::common::response::{validation_message, ApiError, ErrorBody};
use crate::state::AppState;

fn admit(state: &AppState, payload: Result<Json<DownloadRequest>, JsonRejection>) -> Result<Job, ApiError> {
    let Json(req) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    req.validate()
        .map_err(|e| AppError::InvalidInput(validation_message(&e)))?;
    Ok(state.downloads.admit(&req.url, &req.quality, req.audio_only)?)
}

/// Download a video and upload it to storage, waiting for the result
#[utoipa::path(
    post,
    path = "/download",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Pipeline outcome; check `success` and `state`", body = DownloadResponse),
        (status = 400, description = "Malformed url or quality", body = ErrorBody)
    ),
    tag = "Download"
)]
pub async fn download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> impl IntoResponse {
    let job = match admit(&state, payload) {
        Ok(job) => job,
        Err(e) => return e.into_response(),
    };

    let report = state.downloads.run(job).await;
    (StatusCode::OK, Json(DownloadResponse::from(&report))).into_response()
}

/// Queue a download and return immediately
#[utoipa::path(
    post,
    path = "/download-async",
    request_body = DownloadRequest,
    responses(
        (status = 202, description = "Download queued", body = AsyncDownloadResponse),
        (status = 400, description = "Malformed url or quality", body = ErrorBody),
        (status = 503, description = "Work queue is full", body = ErrorBody)
    ),
    tag = "Download"
)]
pub async fn download_async(
    State(state): State<AppState>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> impl IntoResponse {
    let job = match admit(&state, payload) {
        Ok(job) => job,
        Err(e) => return e.into_response(),
    };

    match state.downloads.run_async(job) {
        Ok(id) => (
            StatusCode::ACCEPTED,
            Json(AsyncDownloadResponse {
                message: "Download started in background".to_string(),
                download_id: id,
                status: "processing".to_string(),
            }),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Look up an async download
#[utoipa::path(
    get,
    path = "/status/{download_id}",
    params(
        ("download_id" = Uuid, Path, description = "Id returned by /download-async")
    ),
    responses(
        (status = 200, description = "Current state, with the final result once terminal", body = StatusResponse),
        (status = 404, description = "Unknown download id", body = ErrorBody)
    ),
    tag = "Download"
)]
pub async fn status(State(state): State<AppState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    match state.downloads.status(id) {
        Some(record) => (StatusCode::OK, Json(StatusResponse::from(record))).into_response(),
        None => ApiError::from(AppError::ResourceNotFound(format!("download {} not found", id))).into_response(),
    }
}
