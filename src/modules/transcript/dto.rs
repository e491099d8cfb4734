use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::model::{transcript_text, CaptionEntry};
use super::service::TranscriptOutcome;
use crate::common::error::ErrorKind;
use crate::modules::download::model::ResourceMetadata;

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TranscriptRequest {
    /// Video URL or bare video id.
    #[validate(length(min = 1, message = "must not be empty"))]
    #[schema(example = "https://www.youtube.com/shorts/dQw4w9WgXcQ")]
    pub url: String,
    #[serde(default = "default_language")]
    #[validate(length(min = 2, max = 16, message = "must be a language code"))]
    #[schema(example = "en")]
    pub language: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<CaptionEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_info: Option<ResourceMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_text: Option<String>,
}

impl From<TranscriptOutcome> for TranscriptResponse {
    fn from(outcome: TranscriptOutcome) -> Self {
        let base = Self {
            success: false,
            message: String::new(),
            error_kind: None,
            video_id: outcome.video_id,
            language: outcome.language,
            transcript: None,
            video_info: outcome.metadata,
            transcript_text: None,
        };
        match outcome.result {
            Ok(entries) => Self {
                success: true,
                message: format!("Retrieved {} caption entries", entries.len()),
                transcript_text: Some(transcript_text(&entries)),
                transcript: Some(entries),
                ..base
            },
            Err(error) => Self {
                message: error.to_string(),
                error_kind: Some(error.kind()),
                ..base
            },
        }
    }
}
