use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use super::dto::{TranscriptRequest, TranscriptResponse};
use crate::common::error::{AppError, ErrorKind};
use crate::common::response::{validation_message, ApiError};
use crate::state::AppState;

/// Fetch the caption track of a short video
#[utoipa::path(
    post,
    path = "/transcript",
    request_body = TranscriptRequest,
    responses(
        (status = 200, description = "Captions, or the reason there are none", body = TranscriptResponse),
        (status = 400, description = "Malformed request or unrecognised video locator", body = TranscriptResponse)
    ),
    tag = "Transcript"
)]
pub async fn transcript(
    State(state): State<AppState>,
    payload: Result<Json<TranscriptRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(e) => return ApiError::from(AppError::InvalidInput(e.body_text())).into_response(),
    };
    if let Err(e) = req.validate() {
        return ApiError::from(AppError::InvalidInput(validation_message(&e))).into_response();
    }

    let outcome = state.transcripts.get_captions(&req.url, &req.language).await;
    let response = TranscriptResponse::from(outcome);
    let status = match response.error_kind {
        Some(ErrorKind::InvalidLocator) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    (status, Json(response)).into_response()
}

