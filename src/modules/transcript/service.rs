use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::locator::parse_video_id;
use super::model::{parse_json3, CaptionEntry, TRACK_FORMAT};
use crate::common::error::AppError;
use crate::infrastructure::egress::probe::client_for;
use crate::infrastructure::egress::{EgressPath, EgressPool, Outcome};
use crate::infrastructure::media::{CaptionRef, MediaSource, Probe, YtDlp};
use crate::modules::download::model::ResourceMetadata;

/// Where caption listings and track bodies come from.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    async fn lookup(&self, video_id: &str, egress: &EgressPath) -> Result<Probe, AppError>;
    async fn fetch_track(&self, url: &str, egress: &EgressPath) -> Result<Vec<u8>, AppError>;
}

/// Listings via the extractor probe, track bodies over plain HTTP on the same path.
pub struct ExtractorCaptions {
    extractor: Arc<YtDlp>,
    timeout: Duration,
}

impl ExtractorCaptions {
    pub fn new(extractor: Arc<YtDlp>, timeout: Duration) -> Self {
        Self { extractor, timeout }
    }
}

#[async_trait]
impl CaptionSource for ExtractorCaptions {
    async fn lookup(&self, video_id: &str, egress: &EgressPath) -> Result<Probe, AppError> {
        let target = format!("https://www.youtube.com/watch?v={}", video_id);
        self.extractor.probe(&target, egress).await
    }

    async fn fetch_track(&self, url: &str, egress: &EgressPath) -> Result<Vec<u8>, AppError> {
        let client = client_for(egress, self.timeout)
            .map_err(|e| AppError::Internal(format!("caption client: {}", e)))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.without_url().to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::ResourceForbidden(format!("caption track returned {}", status)));
        }
        if !status.is_success() {
            return Err(AppError::ResourceUnavailable(format!("caption track returned {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.without_url().to_string()))?;
        Ok(body.to_vec())
    }
}

#[derive(Debug)]
pub struct TranscriptOutcome {
    pub video_id: Option<String>,
    pub metadata: Option<ResourceMetadata>,
    pub language: Option<String>,
    pub result: Result<Vec<CaptionEntry>, AppError>,
}

pub struct TranscriptService {
    source: Arc<dyn CaptionSource>,
    egress: Arc<EgressPool>,
    max_duration_secs: u64,
}

impl TranscriptService {
    pub fn new(source: Arc<dyn CaptionSource>, egress: Arc<EgressPool>, max_duration_secs: u64) -> Self {
        Self {
            source,
            egress,
            max_duration_secs,
        }
    }

    pub async fn get_captions(&self, target: &str, language: &str) -> TranscriptOutcome {
        let video_id = match parse_video_id(target) {
            Ok(id) => id,
            Err(error) => {
                return TranscriptOutcome {
                    video_id: None,
                    metadata: None,
                    language: None,
                    result: Err(error),
                };
            }
        };
        let language = language.trim().to_ascii_lowercase();
        let language = if language.is_empty() { "en".to_string() } else { language };

        let path = self.egress.choose();
        let probe = match self.source.lookup(&video_id, &path).await {
            Ok(probe) => {
                self.egress.report(&path, Outcome::Success);
                probe
            }
            Err(error) => {
                self.record_failure(&path, &error);
                warn!(video_id = %video_id, egress = %path.redacted(), error = %error, "Caption lookup failed");
                return TranscriptOutcome {
                    video_id: Some(video_id),
                    metadata: None,
                    language: None,
                    result: Err(as_unavailable(error)),
                };
            }
        };

        let metadata = probe.metadata.clone();
        if metadata.duration_seconds > self.max_duration_secs {
            info!(
                video_id = %video_id,
                duration = metadata.duration_seconds,
                ceiling = self.max_duration_secs,
                "Caption request over duration ceiling"
            );
            return TranscriptOutcome {
                video_id: Some(video_id),
                result: Err(AppError::DurationPolicyViolation {
                    duration_secs: metadata.duration_seconds,
                    ceiling_secs: self.max_duration_secs,
                }),
                metadata: Some(metadata),
                language: None,
            };
        }

        let Some((track_language, track)) = pick_track(&probe, &language) else {
            return TranscriptOutcome {
                video_id: Some(video_id),
                metadata: Some(metadata),
                language: None,
                result: Err(AppError::NoCaptionsAvailable(format!(
                    "no {} captions in language \"{}\"",
                    TRACK_FORMAT, language
                ))),
            };
        };

        let result = match self.source.fetch_track(&track.url, &path).await {
            Ok(body) => {
                self.egress.report(&path, Outcome::Success);
                parse_json3(&body)
            }
            Err(error) => {
                self.record_failure(&path, &error);
                warn!(video_id = %video_id, egress = %path.redacted(), error = %error, "Caption track fetch failed");
                Err(as_unavailable(error))
            }
        };
        if let Ok(entries) = &result {
            info!(video_id = %video_id, language = %track_language, entries = entries.len(), "Captions retrieved");
        }

        TranscriptOutcome {
            video_id: Some(video_id),
            metadata: Some(metadata),
            language: Some(track_language),
            result,
        }
    }

    fn record_failure(&self, path: &EgressPath, error: &AppError) {
        let outcome = if error.is_egress_related() { Outcome::Failure } else { Outcome::Success };
        self.egress.report(path, outcome);
    }
}

/// Caption callers only distinguish "could not reach the video" from the gates above.
fn as_unavailable(error: AppError) -> AppError {
    match error {
        AppError::ResourceUnavailable(_) | AppError::NoCaptionsAvailable(_) | AppError::Internal(_) => error,
        other => AppError::ResourceUnavailable(other.to_string()),
    }
}

/// Manual track, then automatic, then regional variants of the language.
fn pick_track(probe: &Probe, language: &str) -> Option<(String, CaptionRef)> {
    let exact = |tracks: &HashMap<String, Vec<CaptionRef>>| {
        tracks
            .iter()
            .find(|(lang, _)| lang.eq_ignore_ascii_case(language))
            .and_then(|(lang, refs)| json3_of(refs).map(|r| (lang.clone(), r)))
    };
    let regional = |tracks: &HashMap<String, Vec<CaptionRef>>| {
        let prefix = format!("{}-", language);
        let mut variants: Vec<(&String, &Vec<CaptionRef>)> = tracks
            .iter()
            .filter(|(lang, _)| lang.to_ascii_lowercase().starts_with(&prefix))
            .collect();
        variants.sort_by(|a, b| a.0.cmp(b.0));
        variants
            .into_iter()
            .find_map(|(lang, refs)| json3_of(refs).map(|r| (lang.clone(), r)))
    };

    exact(&probe.subtitles)
        .or_else(|| exact(&probe.automatic_captions))
        .or_else(|| regional(&probe.subtitles))
        .or_else(|| regional(&probe.automatic_captions))
}

fn json3_of(refs: &[CaptionRef]) -> Option<CaptionRef> {
    refs.iter().find(|r| r.ext == TRACK_FORMAT).cloned()
}
