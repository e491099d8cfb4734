use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod fetcher;
pub mod format;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/download", post(handler::download))
        .route("/download-async", post(handler::download_async))
        .route("/status/{download_id}", get(handler::status))
}
