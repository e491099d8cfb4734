use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::common::error::AppError;
use crate::infrastructure::egress::EgressPath;
use crate::modules::download::format::{FormatChoice, MediaFormat};
use crate::modules::download::model::ResourceMetadata;

pub mod ytdlp;

pub use ytdlp::YtDlp;

/// A caption track advertised by the probe, keyed by language in [`Probe`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionRef {
    pub ext: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Probe {
    pub metadata: ResourceMetadata,
    pub formats: Vec<MediaFormat>,
    pub subtitles: HashMap<String, Vec<CaptionRef>>,
    pub automatic_captions: HashMap<String, Vec<CaptionRef>>,
}

/// Upstream media extraction. Errors are already classified.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Metadata only; nothing is downloaded.
    async fn probe(&self, target: &str, egress: &EgressPath) -> Result<Probe, AppError>;

    /// Download `choice` using `output_template`, where `%(ext)s` is replaced
    /// by the container extension.
    async fn download(
        &self,
        target: &str,
        choice: &FormatChoice,
        egress: &EgressPath,
        output_template: &Path,
    ) -> Result<(), AppError>;
}
