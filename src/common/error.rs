use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Machine-readable failure kind reported alongside every human message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum ErrorKind {
    InvalidInput,
    UpstreamUnavailable,
    ResourceForbidden,
    ResourceNotFound,
    AuthRequired,
    NoMatchingFormat,
    StoreUnavailable,
    StoreAuthError,
    DurationPolicyViolation,
    NoCaptionsAvailable,
    InvalidLocator,
    ResourceUnavailable,
    Busy,
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Access to the resource is forbidden: {0}")]
    ResourceForbidden(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Upstream requires sign-in: {0}")]
    AuthRequired(String),

    #[error("No matching format: {0}")]
    NoMatchingFormat(String),

    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Object store rejected credentials: {0}")]
    StoreAuthError(String),

    #[error("Video is {duration_secs}s long, captions are limited to {ceiling_secs}s")]
    DurationPolicyViolation { duration_secs: u64, ceiling_secs: u64 },

    #[error("No captions available: {0}")]
    NoCaptionsAvailable(String),

    #[error("Unsupported video locator: {0}")]
    InvalidLocator(String),

    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Service busy: {0}")]
    Busy(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            AppError::ResourceForbidden(_) => ErrorKind::ResourceForbidden,
            AppError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            AppError::AuthRequired(_) => ErrorKind::AuthRequired,
            AppError::NoMatchingFormat(_) => ErrorKind::NoMatchingFormat,
            AppError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            AppError::StoreAuthError(_) => ErrorKind::StoreAuthError,
            AppError::DurationPolicyViolation { .. } => ErrorKind::DurationPolicyViolation,
            AppError::NoCaptionsAvailable(_) => ErrorKind::NoCaptionsAvailable,
            AppError::InvalidLocator(_) => ErrorKind::InvalidLocator,
            AppError::ResourceUnavailable(_) => ErrorKind::ResourceUnavailable,
            AppError::Busy(_) => ErrorKind::Busy,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Failures that say something about the egress path rather than the resource.
    pub fn is_egress_related(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamUnavailable(_) | AppError::ResourceForbidden(_)
        )
    }
}

/// Maps raw extractor output to the taxonomy. Status codes win over text markers.
pub fn classify_upstream_error(raw: &str) -> AppError {
    let text = raw.to_lowercase();
    let detail = last_error_line(raw);

    if text.contains("http error 403") || text.contains("403 forbidden") || text.contains("status code 403") {
        return AppError::ResourceForbidden(detail);
    }
    if text.contains("http error 404") || text.contains("404 not found") || text.contains("status code 404") {
        return AppError::ResourceNotFound(detail);
    }
    const AUTH_MARKERS: &[&str] = &[
        "sign in to confirm",
        "sign in to view",
        "login required",
        "please log in",
        "--cookies",
        "members-only",
        "private video",
    ];
    if AUTH_MARKERS.iter().any(|m| text.contains(m)) {
        return AppError::AuthRequired(detail);
    }
    const GONE_MARKERS: &[&str] = &[
        "video unavailable",
        "does not exist",
        "has been removed",
        "unsupported url",
        "no video could be found",
    ];
    if GONE_MARKERS.iter().any(|m| text.contains(m)) {
        return AppError::ResourceNotFound(detail);
    }
    if text.contains("requested format is not available") || text.contains("no video formats found") {
        return AppError::NoMatchingFormat(detail);
    }
    AppError::UpstreamUnavailable(detail)
}

fn last_error_line(raw: &str) -> String {
    raw.lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| raw.lines().rev().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("no output from extractor")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_take_priority() {
        let err = classify_upstream_error("ERROR: [youtube] abc: HTTP Error 403: Forbidden (sign in)");
        assert_eq!(err.kind(), ErrorKind::ResourceForbidden);

        let err = classify_upstream_error("ERROR: unable to download webpage: HTTP Error 404: Not Found");
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    }

    #[test]
    fn sign_in_markers_map_to_auth_required() {
        let err = classify_upstream_error(
            "WARNING: foo\nERROR: [youtube] xyz: Sign in to confirm you're not a bot. Use --cookies-from-browser",
        );
        assert_eq!(err.kind(), ErrorKind::AuthRequired);
        assert!(err.to_string().contains("Sign in to confirm"));
    }

    #[test]
    fn unknown_failures_are_upstream_unavailable() {
        let err = classify_upstream_error("ERROR: Unable to connect to proxy: Connection reset by peer");
        assert_eq!(err, AppError::UpstreamUnavailable(
            "ERROR: Unable to connect to proxy: Connection reset by peer".to_string()
        ));
        assert!(err.is_egress_related());
    }

    #[test]
    fn removed_videos_are_not_found() {
        let err = classify_upstream_error("ERROR: [youtube] q: Video unavailable. This video has been removed");
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
        assert!(!err.is_egress_related());
    }

    #[test]
    fn empty_output_still_yields_detail() {
        let err = classify_upstream_error("");
        assert_eq!(err, AppError::UpstreamUnavailable("no output from extractor".to_string()));
    }
}
