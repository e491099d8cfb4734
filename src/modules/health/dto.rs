use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use utoipa::ToSchema;

use crate::infrastructure::egress::pool::PathHealth;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress_paths: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_configured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub egress: Option<Vec<EgressHealth>>,
}

/// Failure bookkeeping of one egress path. Credentials never appear here.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressHealth {
    pub id: String,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "2026-10-17T09:30:00Z")]
    pub last_failure_at: Option<String>,
}

impl From<PathHealth> for EgressHealth {
    fn from(health: PathHealth) -> Self {
        Self {
            id: health.id,
            consecutive_failures: health.consecutive_failures,
            last_failure_at: health.last_failure_at.and_then(|at| at.format(&Rfc3339).ok()),
        }
    }
}

impl HealthResponse {
    /// Builds the report from the list of detected problems.
    pub fn from_issues(issues: &[&str], egress: Vec<PathHealth>, store_configured: bool) -> Self {
        let (status, message) = if issues.is_empty() {
            (HealthStatus::Healthy, "All systems operational".to_string())
        } else {
            (HealthStatus::Degraded, format!("Issues detected: {}", issues.join(", ")))
        };
        Self {
            status,
            message,
            egress_paths: Some(egress.len()),
            store_configured: Some(store_configured),
            egress: Some(egress.into_iter().map(EgressHealth::from).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn path(id: &str, failures: u32) -> PathHealth {
        PathHealth {
            id: id.to_string(),
            consecutive_failures: failures,
            last_failure_at: (failures > 0).then_some(datetime!(2026-10-17 09:30:00 UTC)),
        }
    }

    #[test]
    fn issues_are_listed() {
        let body = serde_json::to_value(HealthResponse::from_issues(
            &["Proxy connection failed", "S3 not configured"],
            vec![path("user-1", 0), path("user-2", 4), path("user-3", 0)],
            false,
        ))
        .unwrap();
        assert_eq!(body["status"], json!("degraded"));
        assert_eq!(body["message"], json!("Issues detected: Proxy connection failed, S3 not configured"));
        assert_eq!(body["egressPaths"], json!(3));
    }

    #[test]
    fn egress_failures_are_reported_per_path() {
        let body = serde_json::to_value(HealthResponse::from_issues(
            &[],
            vec![path("user-1", 0), path("user-2", 4)],
            true,
        ))
        .unwrap();
        assert_eq!(body["egress"][0], json!({ "id": "user-1", "consecutiveFailures": 0 }));
        assert_eq!(body["egress"][1]["consecutiveFailures"], json!(4));
        assert_eq!(body["egress"][1]["lastFailureAt"], json!("2026-10-17T09:30:00Z"));
    }

    #[test]
    fn healthy_when_no_issues() {
        let body = serde_json::to_value(HealthResponse::from_issues(&[], vec![path("direct", 0)], true)).unwrap();
        assert_eq!(body["status"], json!("healthy"));
        assert_eq!(body["message"], json!("All systems operational"));
    }
}
