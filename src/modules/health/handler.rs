use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::dto::{HealthResponse, HealthStatus};
use crate::infrastructure::egress::probe::probe_egress;
use crate::state::AppState;

/// Liveness only; nothing is probed
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn root() -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        message: "Media relay API is running".to_string(),
        egress_paths: None,
        store_configured: None,
        egress: None,
    })
}

/// Probe egress and check storage configuration
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Healthy or degraded, with the detected issues", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut issues = Vec::new();

    let egress_ok = probe_egress(&state.egress, &state.config.health_check_url, state.config.health_timeout).await;
    if !egress_ok {
        issues.push("Proxy connection failed");
    }
    let store_configured = state.downloads.store_configured();
    if !store_configured {
        issues.push("S3 not configured");
    }

    (
        StatusCode::OK,
        Json(HealthResponse::from_issues(&issues, state.egress.snapshot(), store_configured)),
    )
}
