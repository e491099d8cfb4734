use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::{config::BehaviorVersion, config::Credentials, config::Region, Client};
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};

use crate::common::error::AppError;
use crate::common::upload::ArtifactStore;
use crate::config::settings::StorageConfig;
use crate::modules::download::model::StoredObject;

// Files above this go through multipart upload; S3 caps single PUTs at 5GB.
const MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;
// Minimum part size for S3 is 5MB.
const PART_SIZE: usize = 16 * 1024 * 1024;

const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "InvalidAccessKeyId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidToken",
];

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
    region: String,
    endpoint: Option<String>,
    key_prefix: String,
    public_domain: Option<String>,
}

impl StorageService {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint {
            // Custom endpoints (MinIO and friends) need path-style addressing.
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());

        info!(bucket = %config.bucket, region = %config.region, "S3 storage configured");

        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            key_prefix: config.key_prefix.clone(),
            public_domain: config.public_domain.clone(),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        public_url(
            &self.bucket,
            &self.region,
            self.endpoint.as_deref(),
            self.public_domain.as_deref(),
            key,
        )
    }

    pub async fn put_object(&self, key: &str, path: &Path, content_type: &str) -> Result<(), AppError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read artifact: {}", e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| store_error("put object", e))?;

        Ok(())
    }

    async fn put_large_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), AppError> {
        upload_multipart(Arc::new(self.clone()), key, path, content_type).await
    }
}

/// The four calls a multipart upload is made of.
#[async_trait]
pub trait MultipartApi: Send + Sync {
    async fn create_multipart_upload(&self, key: &str, content_type: &str) -> Result<String, AppError>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<CompletedPart, AppError>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), AppError>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), AppError>;
}

#[async_trait]
impl MultipartApi for StorageService {
    async fn create_multipart_upload(&self, key: &str, content_type: &str) -> Result<String, AppError> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| store_error("initiate upload", e))?;

        result
            .upload_id
            .ok_or_else(|| AppError::StoreUnavailable("store returned no upload id".to_string()))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<CompletedPart, AppError> {
        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| store_error("upload part", e))?;

        let e_tag = result.e_tag.ok_or_else(|| {
            AppError::StoreUnavailable(format!("part {} returned no ETag", part_number))
        })?;

        Ok(CompletedPart::builder()
            .e_tag(e_tag)
            .part_number(part_number)
            .build())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), AppError> {
        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
            .map_err(|e| store_error("complete upload", e))?;

        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), AppError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| store_error("abort upload", e))?;

        Ok(())
    }
}

/// Streams `path` as a multipart upload. Any failure aborts the upload, and so
/// does dropping the future before it completes.
pub async fn upload_multipart(
    api: Arc<dyn MultipartApi>,
    key: &str,
    path: &Path,
    content_type: &str,
) -> Result<(), AppError> {
    let mut uploader = MultipartUploader::new(api, key.to_string(), content_type).await?;

    match uploader.send_file(path).await {
        Ok(()) => uploader.finish().await,
        Err(e) => {
            error!(key = %key, error = %e, "Multipart upload failed, aborting");
            if let Err(abort_err) = uploader.abort().await {
                warn!(key = %key, error = %abort_err, "Failed to abort multipart upload");
            }
            Err(e)
        }
    }
}

/// Parts stay invisible until `finish`; `abort` discards them. An uploader
/// dropped while still open schedules the abort on the current runtime.
pub struct MultipartUploader {
    api: Arc<dyn MultipartApi>,
    key: String,
    upload_id: String,
    parts: Vec<CompletedPart>,
    part_number: i32,
    open: bool,
}

impl MultipartUploader {
    pub async fn new(api: Arc<dyn MultipartApi>, key: String, content_type: &str) -> Result<Self, AppError> {
        let upload_id = api.create_multipart_upload(&key, content_type).await?;

        Ok(Self {
            api,
            key,
            upload_id,
            parts: Vec::new(),
            part_number: 1,
            open: true,
        })
    }

    async fn send_file(&mut self, path: &Path) -> Result<(), AppError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to open artifact: {}", e)))?;
        let mut buffer = vec![0u8; PART_SIZE];

        loop {
            let mut filled = 0;
            while filled < buffer.len() {
                let n = file
                    .read(&mut buffer[filled..])
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to read artifact: {}", e)))?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                return Ok(());
            }

            let part = self
                .api
                .upload_part(&self.key, &self.upload_id, self.part_number, buffer[..filled].to_vec())
                .await?;
            self.parts.push(part);
            self.part_number += 1;

            if filled < buffer.len() {
                return Ok(());
            }
        }
    }

    /// On error the upload is still open and the drop guard aborts it.
    pub async fn finish(mut self) -> Result<(), AppError> {
        let parts = std::mem::take(&mut self.parts);
        self.api
            .complete_multipart_upload(&self.key, &self.upload_id, parts)
            .await?;
        self.open = false;
        Ok(())
    }

    pub async fn abort(mut self) -> Result<(), AppError> {
        self.open = false;
        self.api
            .abort_multipart_upload(&self.key, &self.upload_id)
            .await
    }
}

impl Drop for MultipartUploader {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        let api = self.api.clone();
        let key = std::mem::take(&mut self.key);
        let upload_id = std::mem::take(&mut self.upload_id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(key = %key, "Multipart upload interrupted, aborting");
                handle.spawn(async move {
                    if let Err(e) = api.abort_multipart_upload(&key, &upload_id).await {
                        warn!(key = %key, error = %e, "Failed to abort interrupted multipart upload");
                    }
                });
            }
            Err(_) => {
                warn!(key = %key, upload_id = %upload_id, "Multipart upload left open, no runtime to abort it");
            }
        }
    }
}

#[async_trait]
impl ArtifactStore for StorageService {
    fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        size_bytes: u64,
        content_type: &str,
    ) -> Result<StoredObject, AppError> {
        if size_bytes > MULTIPART_THRESHOLD {
            self.put_large_file(key, path, content_type).await?;
        } else {
            self.put_object(key, path, content_type).await?;
        }

        Ok(StoredObject {
            key: key.to_string(),
            bucket: self.bucket.clone(),
            url: self.public_url(key),
            content_type: content_type.to_string(),
        })
    }
}

pub fn public_url(
    bucket: &str,
    region: &str,
    endpoint: Option<&str>,
    public_domain: Option<&str>,
    key: &str,
) -> String {
    if let Some(domain) = public_domain {
        let domain = domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            return format!("{}/{}", domain, key);
        }
        return format!("https://{}/{}", domain, key);
    }
    if let Some(endpoint) = endpoint {
        return format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key);
    }
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

fn store_error<E, R>(op: &str, err: SdkError<E, R>) -> AppError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = format!("{} failed: {}", op, DisplayErrorContext(&err));
    classify_store_code(err.code(), detail)
}

/// Credential and permission codes are `StoreAuthError`; every other store
/// failure, including ones with no code at all, is `StoreUnavailable`.
fn classify_store_code(code: Option<&str>, detail: String) -> AppError {
    match code {
        Some(code) if AUTH_ERROR_CODES.contains(&code) => AppError::StoreAuthError(detail),
        _ => AppError::StoreUnavailable(detail),
    }
}
