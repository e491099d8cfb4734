use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerHost,
    ServerPort,
    ProxyUsernames,
    ProxyPassword,
    ProxyEndpoint,
    CaptionProxyUsernames,
    CaptionProxyPassword,
    CaptionProxyEndpoint,
    AwsAccessKey,
    AwsSecretKey,
    AwsBucket,
    AwsRegion,
    S3Endpoint,
    S3KeyPrefix,
    PublicDomain,
    YtdlpBin,
    ScratchDir,
    EgressFailureThreshold,
    FetchMaxAttempts,
    FetchRetryDelaySecs,
    ProbeTimeoutSecs,
    DownloadTimeoutSecs,
    UploadTimeoutSecs,
    HealthTimeoutSecs,
    HealthCheckUrl,
    MaxConcurrentJobs,
    JobQueueCapacity,
    JobHistoryLimit,
    CaptionMaxDurationSecs,
    CaptionTimeoutSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerHost => "APP_HOST",
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::ProxyUsernames => "PROXY_USERNAMES",
            EnvKey::ProxyPassword => "PROXY_PASSWORD",
            EnvKey::ProxyEndpoint => "PROXY_ENDPOINT",
            EnvKey::CaptionProxyUsernames => "CAPTION_PROXY_USERNAMES",
            EnvKey::CaptionProxyPassword => "CAPTION_PROXY_PASSWORD",
            EnvKey::CaptionProxyEndpoint => "CAPTION_PROXY_ENDPOINT",
            EnvKey::AwsAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::AwsSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::AwsBucket => "AWS_BUCKET_NAME",
            EnvKey::AwsRegion => "AWS_REGION",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3KeyPrefix => "S3_KEY_PREFIX",
            EnvKey::PublicDomain => "PUBLIC_DOMAIN",
            EnvKey::YtdlpBin => "YTDLP_BIN",
            EnvKey::ScratchDir => "SCRATCH_DIR",
            EnvKey::EgressFailureThreshold => "EGRESS_FAILURE_THRESHOLD",
            EnvKey::FetchMaxAttempts => "FETCH_MAX_ATTEMPTS",
            EnvKey::FetchRetryDelaySecs => "FETCH_RETRY_DELAY_SECS",
            EnvKey::ProbeTimeoutSecs => "PROBE_TIMEOUT_SECS",
            EnvKey::DownloadTimeoutSecs => "DOWNLOAD_TIMEOUT_SECS",
            EnvKey::UploadTimeoutSecs => "UPLOAD_TIMEOUT_SECS",
            EnvKey::HealthTimeoutSecs => "HEALTH_TIMEOUT_SECS",
            EnvKey::HealthCheckUrl => "HEALTH_CHECK_URL",
            EnvKey::MaxConcurrentJobs => "MAX_CONCURRENT_JOBS",
            EnvKey::JobQueueCapacity => "JOB_QUEUE_CAPACITY",
            EnvKey::JobHistoryLimit => "JOB_HISTORY_LIMIT",
            EnvKey::CaptionMaxDurationSecs => "CAPTION_MAX_DURATION_SECS",
            EnvKey::CaptionTimeoutSecs => "CAPTION_TIMEOUT_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

/// Like [`get`], but blank values count as unset.
pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str())
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    get_opt(key).unwrap_or_else(|| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Comma separated list, empty entries dropped.
pub fn get_list(key: EnvKey) -> Vec<String> {
    get_opt(key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
