use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::error::AppError;

/// Caption track format requested from the upstream.
pub const TRACK_FORMAT: &str = "json3";

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptionEntry {
    pub start_seconds: f64,
    pub duration_seconds: f64,
    pub text: String,
}

#[derive(Deserialize)]
struct Json3Track {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    t_start_ms: Option<u64>,
    d_duration_ms: Option<u64>,
    segs: Option<Vec<Json3Segment>>,
}

#[derive(Deserialize)]
struct Json3Segment {
    utf8: Option<String>,
}

/// Parses a `json3` caption document. Entries keep upstream order; events
/// without text (window/style markers, bare newlines) are dropped.
pub fn parse_json3(body: &[u8]) -> Result<Vec<CaptionEntry>, AppError> {
    let track: Json3Track = serde_json::from_slice(body)
        .map_err(|e| AppError::ResourceUnavailable(format!("caption track is not valid json3: {}", e)))?;

    let entries = track
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event
                .segs?
                .into_iter()
                .filter_map(|s| s.utf8)
                .collect::<String>()
                .replace('\n', " ");
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(CaptionEntry {
                start_seconds: event.t_start_ms.unwrap_or(0) as f64 / 1000.0,
                duration_seconds: event.d_duration_ms.unwrap_or(0) as f64 / 1000.0,
                text: text.to_string(),
            })
        })
        .collect();

    Ok(entries)
}

pub fn transcript_text(entries: &[CaptionEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
