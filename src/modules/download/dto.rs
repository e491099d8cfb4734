use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::model::{JobReport, JobState, ResourceMetadata, StoredObject};
use super::repository::JobRecord;
use crate::common::error::ErrorKind;

fn default_quality() -> String {
    "best".to_string()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[validate(url(message = "must be a valid URL"))]
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    pub url: String,
    /// `best`, `worst` or a height such as `720p`.
    #[serde(default = "default_quality")]
    #[schema(example = "720p")]
    pub quality: String,
    #[serde(default, alias = "audio_only")]
    pub audio_only: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    pub state: JobState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_info: Option<ResourceMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StoredObject>,
    pub download_id: Uuid,
    /// Per-attempt notes: egress used, upstream error text, chosen format.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl From<&JobReport> for DownloadResponse {
    fn from(report: &JobReport) -> Self {
        Self {
            success: report.success(),
            state: report.state,
            message: report.message.clone(),
            error_kind: report.error_kind,
            video_url: report.stored.as_ref().map(|s| s.url.clone()),
            video_info: report.metadata.clone(),
            storage: report.stored.clone(),
            download_id: report.job_id,
            diagnostics: report.diagnostics.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AsyncDownloadResponse {
    pub message: String,
    pub download_id: Uuid,
    #[schema(example = "processing")]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub download_id: Uuid,
    pub status: JobState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DownloadResponse>,
}

impl From<JobRecord> for StatusResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            download_id: record.id,
            status: record.state,
            message: record.message,
            result: record.report.as_ref().map(DownloadResponse::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_and_alias() {
        let req: DownloadRequest = serde_json::from_value(json!({ "url": "https://youtu.be/abcdefghijk" })).unwrap();
        assert_eq!(req.quality, "best");
        assert!(!req.audio_only);

        let req: DownloadRequest =
            serde_json::from_value(json!({ "url": "https://youtu.be/x", "audio_only": true })).unwrap();
        assert!(req.audio_only);

        let req: DownloadRequest = serde_json::from_value(json!({ "url": "nope" })).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn skipped_upload_response_shape() {
        let report = JobReport {
            job_id: Uuid::nil(),
            state: JobState::UploadSkipped,
            error_kind: None,
            message: "Video downloaded but S3 upload not configured".into(),
            metadata: Some(ResourceMetadata::from_parts(Some("t".into()), Some(90.0), None, None, None, "u")),
            stored: None,
            diagnostics: vec![],
        };
        let body = serde_json::to_value(DownloadResponse::from(&report)).unwrap();

        assert_eq!(body["success"], json!(false));
        assert_eq!(body["state"], json!("upload_skipped"));
        assert_eq!(body["videoInfo"]["durationSeconds"], json!(90));
        assert!(body.get("videoUrl").is_none());
        assert!(body.get("errorKind").is_none());
        assert!(body.get("diagnostics").is_none());
    }

    #[test]
    fn fetch_failure_exposes_attempt_notes() {
        let report = JobReport {
            job_id: Uuid::nil(),
            state: JobState::FetchFailed,
            error_kind: Some(ErrorKind::UpstreamUnavailable),
            message: "Error downloading video: Upstream unavailable: Connection reset by peer".into(),
            metadata: None,
            stored: None,
            diagnostics: vec![
                "attempt 1 via user-1@p.webshare.io:80: Upstream unavailable: Connection reset by peer".into(),
                "attempt 2 via user-2@p.webshare.io:80: Upstream unavailable: Connection reset by peer".into(),
            ],
        };
        let body = serde_json::to_value(DownloadResponse::from(&report)).unwrap();

        assert_eq!(body["errorKind"], json!("UpstreamUnavailable"));
        let notes = body["diagnostics"].as_array().unwrap();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].as_str().unwrap().starts_with("attempt 1 via user-1@"));

        let record = JobRecord {
            id: Uuid::nil(),
            state: JobState::FetchFailed,
            message: report.message.clone(),
            report: Some(report),
            updated_at: time::OffsetDateTime::now_utc(),
        };
        let status = serde_json::to_value(StatusResponse::from(record)).unwrap();
        assert_eq!(status["result"]["diagnostics"].as_array().unwrap().len(), 2);
    }
}
