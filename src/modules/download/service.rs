use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use super::fetcher::ResourceFetcher;
use super::model::{Job, JobReport, JobState, Quality, ResourceMetadata, StoredObject};
use super::repository::{JobRecord, JobRepository};
use crate::common::error::{AppError, ErrorKind};
use crate::common::upload::{upload_artifact, ArtifactStore};

#[derive(Debug, Clone)]
pub struct DownloadLimits {
    pub scratch_root: PathBuf,
    pub upload_timeout: Duration,
    pub max_concurrent_jobs: usize,
    pub queue_capacity: usize,
}

/// Runs jobs through fetch and upload, synchronously or via the worker queue.
pub struct DownloadService {
    fetcher: ResourceFetcher,
    store: Option<Arc<dyn ArtifactStore>>,
    jobs: Arc<JobRepository>,
    scratch_root: PathBuf,
    upload_timeout: Duration,
    permits: Arc<Semaphore>,
    queue: async_channel::Sender<Job>,
}

impl DownloadService {
    /// Returns the service plus the receiving end of its work queue for the worker pool.
    pub fn new(
        fetcher: ResourceFetcher,
        store: Option<Arc<dyn ArtifactStore>>,
        jobs: Arc<JobRepository>,
        limits: DownloadLimits,
    ) -> (Self, async_channel::Receiver<Job>) {
        let (tx, rx) = async_channel::bounded(limits.queue_capacity.max(1));
        let service = Self {
            fetcher,
            store,
            jobs,
            scratch_root: limits.scratch_root,
            upload_timeout: limits.upload_timeout,
            permits: Arc::new(Semaphore::new(limits.max_concurrent_jobs.max(1))),
            queue: tx,
        };
        (service, rx)
    }

    pub fn store_configured(&self) -> bool {
        self.store.is_some()
    }

    pub fn status(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.get(id)
    }

    /// Validates the request and builds a pending job. Only http(s) targets are accepted.
    pub fn admit(&self, target: &str, quality: &str, audio_only: bool) -> Result<Job, AppError> {
        let parsed = Url::parse(target.trim())
            .map_err(|e| AppError::InvalidInput(format!("url is not valid: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::InvalidInput(format!(
                "url must use http or https, got \"{}\"",
                parsed.scheme()
            )));
        }
        let quality: Quality = quality.parse()?;
        Ok(Job::new(parsed.as_str(), quality, audio_only))
    }

    pub async fn run(&self, job: Job) -> JobReport {
        self.jobs.insert(job.id);
        self.execute(job).await
    }

    pub fn run_async(&self, job: Job) -> Result<Uuid, AppError> {
        let id = job.id;
        self.jobs.insert(id);
        if let Err(e) = self.queue.try_send(job) {
            self.jobs.remove(id);
            if e.is_full() {
                warn!(job_id = %id, "Rejected async download, queue is full");
                return Err(AppError::Busy("download queue is full".to_string()));
            }
            warn!(job_id = %id, "Rejected async download, queue is closed");
            return Err(AppError::Internal("download queue is closed".to_string()));
        }
        info!(job_id = %id, "Download queued");
        Ok(id)
    }

    /// Drives one job to a terminal state and records it. Panics become a
    /// `Failed` report; dropping the future marks the job abandoned.
    pub async fn execute(&self, job: Job) -> JobReport {
        let id = job.id;
        let guard = AbandonGuard {
            jobs: self.jobs.clone(),
            id,
            armed: true,
        };

        let report = match AssertUnwindSafe(self.drive(job)).catch_unwind().await {
            Ok(report) => report,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(job_id = %id, detail = %detail, "Download job panicked");
                JobReport {
                    job_id: id,
                    state: JobState::Failed,
                    error_kind: Some(ErrorKind::Internal),
                    message: format!("Unexpected error: {}", detail),
                    metadata: None,
                    stored: None,
                    diagnostics: vec![detail],
                }
            }
        };

        self.jobs.complete(report.clone());
        guard.disarm();
        report
    }

    async fn drive(&self, mut job: Job) -> JobReport {
        let Ok(_permit) = self.permits.clone().acquire_owned().await else {
            let error = AppError::Internal("job limiter closed".to_string());
            return self.conclude(&mut job, JobState::Failed, Some(&error), format!("Unexpected error: {}", error), None, None);
        };

        let scratch = match self.allocate_scratch(job.id).await {
            Ok(dir) => dir,
            Err(error) => {
                error!(job_id = %job.id, error = %error, "Could not allocate scratch directory");
                return self.conclude(&mut job, JobState::Failed, Some(&error), format!("Unexpected error: {}", error), None, None);
            }
        };

        self.transition(&mut job, JobState::Fetching, "Downloading video");
        let (metadata, artifact) = match self.fetcher.fetch(&mut job, scratch.path()).await {
            Ok(fetched) => fetched,
            Err(failure) => {
                let message = format!("Error downloading video: {}", failure.error);
                let report = self.conclude(&mut job, JobState::FetchFailed, Some(&failure.error), message, failure.metadata, None);
                release_scratch(scratch, report.job_id);
                return report;
            }
        };

        let Some(store) = &self.store else {
            let report = self.conclude(
                &mut job,
                JobState::UploadSkipped,
                None,
                "Video downloaded but S3 upload not configured".to_string(),
                Some(metadata),
                None,
            );
            release_scratch(scratch, report.job_id);
            return report;
        };

        self.transition(&mut job, JobState::Uploading, "Uploading to storage");
        let uploaded = tokio::time::timeout(
            self.upload_timeout,
            upload_artifact(store.as_ref(), &artifact, job.id, &metadata.title),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::StoreUnavailable(format!(
                "upload timed out after {}s",
                self.upload_timeout.as_secs()
            )))
        });

        let report = match uploaded {
            Ok(stored) => self.conclude(
                &mut job,
                JobState::Succeeded,
                None,
                "Video downloaded and uploaded successfully".to_string(),
                Some(metadata),
                Some(stored),
            ),
            Err(error) => {
                let message = format!("Video downloaded but upload failed: {}", error);
                self.conclude(&mut job, JobState::UploadFailed, Some(&error), message, Some(metadata), None)
            }
        };
        release_scratch(scratch, report.job_id);
        report
    }

    async fn allocate_scratch(&self, job_id: Uuid) -> Result<TempDir, AppError> {
        tokio::fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(|e| AppError::Internal(format!("scratch root unavailable: {}", e)))?;
        tempfile::Builder::new()
            .prefix(&format!("job-{}-", job_id))
            .tempdir_in(&self.scratch_root)
            .map_err(|e| AppError::Internal(format!("scratch directory unavailable: {}", e)))
    }

    fn transition(&self, job: &mut Job, state: JobState, message: &str) {
        if job.advance(state) {
            self.jobs.set_state(job.id, state, message);
            info!(job_id = %job.id, state = state.as_str(), "Job transition");
        }
    }

    fn conclude(
        &self,
        job: &mut Job,
        state: JobState,
        error: Option<&AppError>,
        message: String,
        metadata: Option<ResourceMetadata>,
        stored: Option<StoredObject>,
    ) -> JobReport {
        job.advance(state);
        let elapsed_secs = (OffsetDateTime::now_utc() - job.created_at).as_seconds_f64();
        match error {
            Some(e) => warn!(job_id = %job.id, state = state.as_str(), kind = ?e.kind(), elapsed_secs, "Job finished with error"),
            None => info!(job_id = %job.id, state = state.as_str(), elapsed_secs, "Job finished"),
        }
        JobReport {
            job_id: job.id,
            state,
            error_kind: error.map(AppError::kind),
            message,
            metadata,
            stored,
            diagnostics: job.diagnostics.clone(),
        }
    }
}

fn release_scratch(scratch: TempDir, job_id: Uuid) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(%job_id, path = %path.display(), error = %e, "Failed to remove scratch directory");
    }
}

struct AbandonGuard {
    jobs: Arc<JobRepository>,
    id: Uuid,
    armed: bool,
}

impl AbandonGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!(job_id = %self.id, "Download dropped before completion");
            self.jobs.mark_abandoned(self.id);
        }
    }
}
