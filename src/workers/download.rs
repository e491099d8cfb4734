use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::modules::download::model::Job;
use crate::modules::download::service::DownloadService;

/// Starts `count` workers draining the async download queue. They exit once
/// every sender is gone and the queue is empty.
pub fn spawn_download_workers(
    service: Arc<DownloadService>,
    queue: async_channel::Receiver<Job>,
    count: usize,
) -> Vec<JoinHandle<()>> {
    info!(workers = count, "Starting download workers");
    (0..count.max(1))
        .map(|worker| tokio::spawn(run_worker(worker, service.clone(), queue.clone())))
        .collect()
}

async fn run_worker(worker: usize, service: Arc<DownloadService>, queue: async_channel::Receiver<Job>) {
    while let Ok(job) = queue.recv().await {
        info!(worker, job_id = %job.id, target = %job.target, "Picked up download job");

        let report = service.execute(job).await;
        if report.success() {
            info!(worker, job_id = %report.job_id, "Download job completed");
        } else {
            warn!(
                worker,
                job_id = %report.job_id,
                state = report.state.as_str(),
                message = %report.message,
                "Download job finished without upload"
            );
        }
    }
    info!(worker, "Download queue closed, worker exiting");
}
