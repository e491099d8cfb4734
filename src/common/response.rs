use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::common::error::{AppError, ErrorKind};

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error_kind: ErrorKind,
    pub message: String,
}

pub struct ApiError(pub AppError, pub StatusCode);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidInput | ErrorKind::InvalidLocator => StatusCode::BAD_REQUEST,
            ErrorKind::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorKind::UpstreamUnavailable | ErrorKind::StoreUnavailable | ErrorKind::Busy => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(err, status)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (err, status) = (self.0, self.1);
        let body = ErrorBody {
            success: false,
            error_kind: err.kind(),
            message: err.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Flattens `validator` output into a single readable line.
pub fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let reasons: Vec<String> = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            format!("{}: {}", field, reasons.join(", "))
        })
        .collect();
    fields.sort();
    fields.join("; ")
}
