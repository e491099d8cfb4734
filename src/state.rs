use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::egress::EgressPool;
use crate::modules::download::service::DownloadService;
use crate::modules::transcript::service::TranscriptService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Download egress; the caption pool lives inside `transcripts`.
    pub egress: Arc<EgressPool>,
    pub downloads: Arc<DownloadService>,
    pub transcripts: Arc<TranscriptService>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        egress: Arc<EgressPool>,
        downloads: Arc<DownloadService>,
        transcripts: Arc<TranscriptService>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            egress,
            downloads,
            transcripts,
        }
    }
}
