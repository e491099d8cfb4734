use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod modules;
mod routes;
mod state;
mod workers;

use crate::common::upload::ArtifactStore;
use crate::config::settings::AppConfig;
use crate::infrastructure::egress::EgressPool;
use crate::infrastructure::media::YtDlp;
use crate::infrastructure::storage::s3::StorageService;
use crate::modules::download::fetcher::{ResourceFetcher, RetryPolicy};
use crate::modules::download::repository::JobRepository;
use crate::modules::download::service::{DownloadLimits, DownloadService};
use crate::modules::transcript::service::{ExtractorCaptions, TranscriptService};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    info!("Starting server...");

    let config = AppConfig::new();

    let egress = Arc::new(EgressPool::from_credentials(
        "download",
        &config.proxy,
        config.egress_failure_threshold,
    ));
    let caption_egress = Arc::new(EgressPool::from_credentials(
        "caption",
        &config.caption_proxy,
        config.egress_failure_threshold,
    ));

    let extractor = Arc::new(YtDlp::new(
        config.ytdlp_bin.clone(),
        config.probe_timeout,
        config.download_timeout,
    ));

    let store: Option<Arc<dyn ArtifactStore>> = match &config.storage {
        Some(storage) => Some(Arc::new(StorageService::new(storage))),
        None => {
            warn!("S3 credentials not configured; downloads will not be uploaded");
            None
        }
    };

    let fetcher = ResourceFetcher::new(
        extractor.clone(),
        egress.clone(),
        RetryPolicy {
            max_attempts: config.fetch_max_attempts,
            base_delay: config.fetch_retry_delay,
        },
    );
    let (downloads, queue) = DownloadService::new(
        fetcher,
        store,
        Arc::new(JobRepository::new(config.job_history_limit)),
        DownloadLimits {
            scratch_root: config.scratch_dir.join("media-relay"),
            upload_timeout: config.upload_timeout,
            max_concurrent_jobs: config.max_concurrent_jobs,
            queue_capacity: config.job_queue_capacity,
        },
    );
    let downloads = Arc::new(downloads);
    workers::download::spawn_download_workers(downloads.clone(), queue, config.max_concurrent_jobs);

    let transcripts = Arc::new(TranscriptService::new(
        Arc::new(ExtractorCaptions::new(extractor, config.caption_timeout)),
        caption_egress,
        config.caption_max_duration_secs,
    ));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(config, egress, downloads, transcripts);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
