use utoipa::OpenApi;

use crate::common::error::ErrorKind;
use crate::common::response::ErrorBody;
use crate::modules::download::dto::{AsyncDownloadResponse, DownloadRequest, DownloadResponse, StatusResponse};
use crate::modules::download::model::{JobState, ResourceMetadata, StoredObject};
use crate::modules::health::dto::{EgressHealth, HealthResponse, HealthStatus};
use crate::modules::transcript::dto::{TranscriptRequest, TranscriptResponse};
use crate::modules::transcript::model::CaptionEntry;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::health::handler::root,
        crate::modules::health::handler::health,
        crate::modules::download::handler::download,
        crate::modules::download::handler::download_async,
        crate::modules::download::handler::status,
        crate::modules::transcript::handler::transcript,
    ),
    components(
        schemas(
            DownloadRequest, DownloadResponse, AsyncDownloadResponse, StatusResponse,
            JobState, ResourceMetadata, StoredObject,
            TranscriptRequest, TranscriptResponse, CaptionEntry,
            HealthResponse, HealthStatus, EgressHealth,
            ErrorBody, ErrorKind,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and dependency checks"),
        (name = "Download", description = "Fetch media and relay it to object storage"),
        (name = "Transcript", description = "Caption retrieval for short videos")
    )
)]
pub struct ApiDoc;
