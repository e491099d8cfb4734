use std::path::PathBuf;
use std::time::Duration;

use crate::config::env::{self, EnvKey};

const DEFAULT_PROXY_ENDPOINT: &str = "p.webshare.io:80";

/// One proxied egress domain: a set of usernames sharing a password and endpoint.
#[derive(Clone, Debug, Default)]
pub struct ProxyCredentials {
    pub usernames: Vec<String>,
    pub password: Option<String>,
    pub endpoint: String,
}

impl ProxyCredentials {
    /// Usernames without a password cannot authenticate, so they are ignored.
    pub fn is_usable(&self) -> bool {
        !self.usernames.is_empty() && self.password.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub key_prefix: String,
    pub public_domain: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub proxy: ProxyCredentials,
    pub caption_proxy: ProxyCredentials,
    /// `None` when any of key, secret or bucket is missing.
    pub storage: Option<StorageConfig>,
    pub ytdlp_bin: String,
    pub scratch_dir: PathBuf,
    pub egress_failure_threshold: u32,
    pub fetch_max_attempts: u32,
    pub fetch_retry_delay: Duration,
    pub probe_timeout: Duration,
    pub download_timeout: Duration,
    pub upload_timeout: Duration,
    pub health_timeout: Duration,
    pub health_check_url: String,
    pub max_concurrent_jobs: usize,
    pub job_queue_capacity: usize,
    pub job_history_limit: usize,
    pub caption_max_duration_secs: u64,
    pub caption_timeout: Duration,
}

impl AppConfig {
    pub fn new() -> Self {
        let storage = match (
            env::get_opt(EnvKey::AwsAccessKey),
            env::get_opt(EnvKey::AwsSecretKey),
            env::get_opt(EnvKey::AwsBucket),
        ) {
            (Some(access_key), Some(secret_key), Some(bucket)) => Some(StorageConfig {
                access_key,
                secret_key,
                bucket,
                region: env::get_or(EnvKey::AwsRegion, "us-east-1"),
                endpoint: env::get_opt(EnvKey::S3Endpoint),
                key_prefix: env::get_or(EnvKey::S3KeyPrefix, "youtube_videos"),
                public_domain: env::get_opt(EnvKey::PublicDomain),
            }),
            _ => None,
        };

        Self {
            server_host: env::get_or(EnvKey::ServerHost, "0.0.0.0"),
            server_port: env::get_parsed(EnvKey::ServerPort, 8000),
            proxy: ProxyCredentials {
                usernames: env::get_list(EnvKey::ProxyUsernames),
                password: env::get_opt(EnvKey::ProxyPassword),
                endpoint: env::get_or(EnvKey::ProxyEndpoint, DEFAULT_PROXY_ENDPOINT),
            },
            caption_proxy: ProxyCredentials {
                usernames: env::get_list(EnvKey::CaptionProxyUsernames),
                password: env::get_opt(EnvKey::CaptionProxyPassword),
                endpoint: env::get_or(EnvKey::CaptionProxyEndpoint, DEFAULT_PROXY_ENDPOINT),
            },
            storage,
            ytdlp_bin: env::get_or(EnvKey::YtdlpBin, "yt-dlp"),
            scratch_dir: env::get_opt(EnvKey::ScratchDir)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            egress_failure_threshold: env::get_parsed(EnvKey::EgressFailureThreshold, 3).max(1),
            fetch_max_attempts: env::get_parsed(EnvKey::FetchMaxAttempts, 4).max(1),
            fetch_retry_delay: secs(env::get_parsed(EnvKey::FetchRetryDelaySecs, 2)),
            probe_timeout: secs(env::get_parsed(EnvKey::ProbeTimeoutSecs, 60)),
            download_timeout: secs(env::get_parsed(EnvKey::DownloadTimeoutSecs, 1800)),
            upload_timeout: secs(env::get_parsed(EnvKey::UploadTimeoutSecs, 600)),
            health_timeout: secs(env::get_parsed(EnvKey::HealthTimeoutSecs, 10)),
            health_check_url: env::get_or(EnvKey::HealthCheckUrl, "http://httpbin.org/ip"),
            max_concurrent_jobs: env::get_parsed(EnvKey::MaxConcurrentJobs, 4).max(1),
            job_queue_capacity: env::get_parsed(EnvKey::JobQueueCapacity, 256).max(1),
            job_history_limit: env::get_parsed(EnvKey::JobHistoryLimit, 1000).max(1),
            caption_max_duration_secs: env::get_parsed(EnvKey::CaptionMaxDurationSecs, 60),
            caption_timeout: secs(env::get_parsed(EnvKey::CaptionTimeoutSecs, 30)),
        }
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}
