use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::{AppError, ErrorKind};

/// Height cap used when the caller asks for "best".
pub const BEST_HEIGHT_CAP: u32 = 1080;

/// Anything at or under this many seconds is treated as short-form.
pub const SHORT_FORM_MAX_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Best,
    Worst,
    Height(u32),
}

impl FromStr for Quality {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "" | "best" => Ok(Quality::Best),
            "worst" => Ok(Quality::Worst),
            other => other
                .strip_suffix('p')
                .unwrap_or(other)
                .parse::<u32>()
                .ok()
                .filter(|h| *h > 0)
                .map(Quality::Height)
                .ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "quality must be \"best\", \"worst\" or \"<N>p\", got \"{}\"",
                        s
                    ))
                }),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => write!(f, "best"),
            Quality::Worst => write!(f, "worst"),
            Quality::Height(h) => write!(f, "{}p", h),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Fetching,
    Uploading,
    Succeeded,
    FetchFailed,
    UploadSkipped,
    UploadFailed,
    Failed,
}

impl JobState {
    fn rank(self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Fetching => 1,
            JobState::Uploading => 2,
            _ => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 3
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Fetching => "fetching",
            JobState::Uploading => "uploading",
            JobState::Succeeded => "succeeded",
            JobState::FetchFailed => "fetch_failed",
            JobState::UploadSkipped => "upload_skipped",
            JobState::UploadFailed => "upload_failed",
            JobState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub target: String,
    pub quality: Quality,
    pub audio_only: bool,
    pub state: JobState,
    pub created_at: OffsetDateTime,
    pub diagnostics: Vec<String>,
}

impl Job {
    pub fn new(target: impl Into<String>, quality: Quality, audio_only: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.into(),
            quality,
            audio_only,
            state: JobState::Pending,
            created_at: OffsetDateTime::now_utc(),
            diagnostics: Vec::new(),
        }
    }

    /// Moves the job forward. Backward moves and leaving a terminal state are refused.
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            return false;
        }
        self.state = next;
        true
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.diagnostics.push(line.into());
    }
}

/// Validated metadata: every field has a value, so later stages never branch on presence.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub title: String,
    pub duration_seconds: u64,
    pub owner_name: String,
    pub view_count: u64,
    pub source_url: String,
    pub is_short_form: bool,
}

impl ResourceMetadata {
    pub fn from_parts(
        title: Option<String>,
        duration_seconds: Option<f64>,
        owner_name: Option<String>,
        view_count: Option<u64>,
        source_url: Option<String>,
        requested_url: &str,
    ) -> Self {
        let duration_seconds = duration_seconds
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
            .unwrap_or(0);
        let source_url = source_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| requested_url.to_string());
        let is_short_form = source_url.contains("/shorts/")
            || requested_url.contains("/shorts/")
            || (duration_seconds > 0 && duration_seconds <= SHORT_FORM_MAX_SECS);

        Self {
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Unknown Title".to_string()),
            duration_seconds,
            owner_name: owner_name
                .filter(|o| !o.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            view_count: view_count.unwrap_or(0),
            source_url,
            is_short_form,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub key: String,
    pub bucket: String,
    pub url: String,
    pub content_type: String,
}

/// Terminal outcome of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job_id: Uuid,
    pub state: JobState,
    pub error_kind: Option<ErrorKind>,
    pub message: String,
    pub metadata: Option<ResourceMetadata>,
    pub stored: Option<StoredObject>,
    pub diagnostics: Vec<String>,
}

impl JobReport {
    pub fn success(&self) -> bool {
        self.state == JobState::Succeeded
    }
}
