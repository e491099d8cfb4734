use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use super::format::{select_format, FormatChoice};
use super::model::{Job, LocalArtifact, Quality, ResourceMetadata, BEST_HEIGHT_CAP};
use crate::common::error::AppError;
use crate::common::upload::content_type_for;
use crate::infrastructure::egress::{EgressPath, EgressPool, Outcome};
use crate::infrastructure::media::MediaSource;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

// Extractor leftovers that never count as a finished artifact.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Linear backoff, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(MAX_RETRY_DELAY)
    }
}

#[derive(Debug)]
pub struct FetchFailure {
    pub error: AppError,
    /// Whatever the probe produced before the failure.
    pub metadata: Option<ResourceMetadata>,
}

pub struct ResourceFetcher {
    source: Arc<dyn MediaSource>,
    egress: Arc<EgressPool>,
    policy: RetryPolicy,
}

impl ResourceFetcher {
    pub fn new(source: Arc<dyn MediaSource>, egress: Arc<EgressPool>, policy: RetryPolicy) -> Self {
        Self {
            source,
            egress,
            policy,
        }
    }

    pub async fn fetch(&self, job: &mut Job, scratch: &Path) -> Result<(ResourceMetadata, LocalArtifact), FetchFailure> {
        let probe_path = self.egress.choose();
        let probe = match self.source.probe(&job.target, &probe_path).await {
            Ok(probe) => {
                self.record(&probe_path, None);
                probe
            }
            Err(error) => {
                self.record(&probe_path, Some(&error));
                warn!(job_id = %job.id, egress = %probe_path.redacted(), error = %error, "Metadata probe failed");
                job.note(format!("probe via {}: {}", probe_path.redacted(), error));
                return Err(FetchFailure {
                    error,
                    metadata: None,
                });
            }
        };
        let metadata = probe.metadata;

        let choice = if probe.formats.is_empty() {
            // Nothing itemised: let the extractor pick with an equivalent expression.
            extractor_default(job.quality, job.audio_only)
        } else {
            match select_format(&probe.formats, job.quality, job.audio_only) {
                Some(choice) => choice,
                None => {
                    return Err(FetchFailure {
                        error: AppError::NoMatchingFormat(format!(
                            "no representation satisfies quality {}",
                            job.quality
                        )),
                        metadata: Some(metadata),
                    });
                }
            }
        };
        info!(
            job_id = %job.id,
            format = %choice.format_id,
            ext = %choice.ext,
            height = ?choice.height,
            "Format selected"
        );
        job.note(format!("selected format {} ({})", choice.format_id, choice.selector));

        match self.download_with_retry(job, &choice, scratch).await {
            Ok(artifact) => Ok((metadata, artifact)),
            Err(error) => Err(FetchFailure {
                error,
                metadata: Some(metadata),
            }),
        }
    }

    async fn download_with_retry(
        &self,
        job: &mut Job,
        choice: &FormatChoice,
        scratch: &Path,
    ) -> Result<LocalArtifact, AppError> {
        let template = scratch.join(format!("{}.%(ext)s", job.id));
        let mut tried: Vec<String> = Vec::new();
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            let path = self.egress.choose_excluding(&tried);
            tried.push(path.id.clone());
            info!(job_id = %job.id, attempt, egress = %path.redacted(), "Downloading");

            match self.source.download(&job.target, choice, &path, &template).await {
                Ok(()) => {
                    self.record(&path, None);
                    if let Some(artifact) = find_artifact(scratch, job.id).await {
                        info!(job_id = %job.id, size = artifact.size_bytes, path = %artifact.path.display(), "Download complete");
                        return Ok(artifact);
                    }
                    job.note(format!("attempt {} via {}: no file produced", attempt, path.redacted()));
                    last_error = Some(AppError::NoMatchingFormat(
                        "extractor finished without producing a file".to_string(),
                    ));
                    break;
                }
                Err(error) => {
                    self.record(&path, Some(&error));
                    clear_scratch(scratch).await;
                    warn!(job_id = %job.id, attempt, egress = %path.redacted(), error = %error, "Download attempt failed");
                    job.note(format!("attempt {} via {}: {}", attempt, path.redacted(), error));

                    let retry = error.is_egress_related() && attempt < self.policy.max_attempts;
                    last_error = Some(error);
                    if !retry {
                        break;
                    }
                    tokio::time::sleep(self.policy.delay_for(attempt)).await;
                }
            }
        }

        clear_scratch(scratch).await;
        Err(last_error.unwrap_or_else(|| AppError::NoMatchingFormat("no download attempt succeeded".to_string())))
    }

    fn record(&self, path: &EgressPath, error: Option<&AppError>) {
        let outcome = match error {
            Some(e) if e.is_egress_related() => Outcome::Failure,
            _ => Outcome::Success,
        };
        self.egress.report(path, outcome);
    }
}

fn extractor_default(quality: Quality, audio_only: bool) -> FormatChoice {
    let selector = match (audio_only, quality) {
        (true, _) => "bestaudio/best".to_string(),
        (false, Quality::Worst) => "worst".to_string(),
        (false, Quality::Best) => format!("best[height<={}]/best", BEST_HEIGHT_CAP),
        (false, Quality::Height(h)) => format!("best[height<={}]/best", h),
    };
    FormatChoice {
        format_id: selector.clone(),
        ext: String::new(),
        height: None,
        selector,
    }
}

async fn find_artifact(scratch: &Path, job_id: Uuid) -> Option<LocalArtifact> {
    let prefix = format!("{}.", job_id);
    let mut best: Option<(PathBuf, u64)> = None;

    let mut entries = tokio::fs::read_dir(scratch).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&prefix) || PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() || meta.len() == 0 {
            continue;
        }
        if best.as_ref().is_none_or(|(_, size)| meta.len() > *size) {
            best = Some((entry.path(), meta.len()));
        }
    }

    best.map(|(path, size_bytes)| LocalArtifact {
        mime_type: content_type_for(&path),
        path,
        size_bytes,
    })
}

/// Drops everything in the job's scratch directory; it only ever holds this job's files.
async fn clear_scratch(scratch: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(scratch).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let removed = match entry.file_type().await {
            Ok(t) if t.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        if let Err(e) = removed {
            warn!(path = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
}
