use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

// Requests are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn create_app(state: AppState) -> Router {
    crate::routes::configure_routes()
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::settings::AppConfig;
    use crate::infrastructure::egress::EgressPool;
    use crate::infrastructure::media::YtDlp;
    use crate::modules::download::fetcher::tests::{sample_probe, FakeSource};
    use crate::modules::download::service::tests::service_with;
    use crate::modules::transcript::service::{ExtractorCaptions, TranscriptService};
    use crate::workers::download::spawn_download_workers;

    fn test_app(scratch: &std::path::Path) -> Router {
        test_app_with(scratch, AppConfig::new())
    }

    /// App with a fake extractor that always succeeds, no object store, and
    /// one worker draining the async queue.
    fn test_app_with(scratch: &std::path::Path, config: AppConfig) -> Router {
        let source = Arc::new(FakeSource::new(Ok(sample_probe(200.0)), vec![Ok(())]));
        let (downloads, queue) = service_with(source, None, scratch);
        let downloads = Arc::new(downloads);
        spawn_download_workers(downloads.clone(), queue, 1);

        let extractor = Arc::new(YtDlp::new("yt-dlp-missing", Duration::from_secs(1), Duration::from_secs(1)));
        let transcripts = TranscriptService::new(
            Arc::new(ExtractorCaptions::new(extractor, Duration::from_secs(1))),
            Arc::new(EgressPool::new("caption", vec![], 3)),
            60,
        );
        let state = AppState::new(
            config,
            Arc::new(EgressPool::new("download", vec![], 3)),
            downloads,
            Arc::new(transcripts),
        );
        create_app(state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn malformed_download_request_is_400() {
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(test_app(scratch.path()), "/download", json!({ "url": "not a url" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKind"], json!("InvalidInput"));
        assert_eq!(body["success"], json!(false));

        let (status, body) = post(
            test_app(scratch.path()),
            "/download",
            json!({ "url": "https://youtu.be/abcdefghijk", "quality": "ultra" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKind"], json!("InvalidInput"));
    }

    #[tokio::test]
    async fn download_without_store_reports_upload_skipped() {
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(
            test_app(scratch.path()),
            "/download",
            json!({ "url": "https://www.youtube.com/watch?v=abcdefghijk", "quality": "720p" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["state"], json!("upload_skipped"));
        assert_eq!(body["videoInfo"]["title"], json!("Sample Clip"));
    }

    #[tokio::test]
    async fn unknown_status_is_404() {
        let scratch = tempfile::tempdir().unwrap();
        let response = test_app(scratch.path())
            .oneshot(
                Request::get(format!("/status/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unrecognised_locator_is_400() {
        let scratch = tempfile::tempdir().unwrap();

        let (status, body) = post(
            test_app(scratch.path()),
            "/transcript",
            json!({ "url": "https://vimeo.com/76979871" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKind"], json!("InvalidLocator"));
    }

    #[tokio::test]
    async fn health_reports_unreachable_egress_and_missing_store() {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = AppConfig::new();
        // Nothing listens on the discard port.
        config.health_check_url = "http://127.0.0.1:9/ip".to_string();
        config.health_timeout = Duration::from_secs(2);

        let (status, body) = get(test_app_with(scratch.path(), config), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("degraded"));
        assert_eq!(
            body["message"],
            json!("Issues detected: Proxy connection failed, S3 not configured")
        );
        assert_eq!(body["storeConfigured"], json!(false));
        assert_eq!(body["egressPaths"], json!(1));
        assert_eq!(body["egress"][0]["id"], json!("direct"));
        assert_eq!(body["egress"][0]["consecutiveFailures"], json!(1));
        assert!(body["egress"][0]["lastFailureAt"].is_string());
    }

    #[tokio::test]
    async fn async_download_is_tracked_until_terminal() {
        let scratch = tempfile::tempdir().unwrap();
        let app = test_app(scratch.path());

        let (status, body) = post(
            app.clone(),
            "/download-async",
            json!({ "url": "https://www.youtube.com/watch?v=abcdefghijk", "quality": "720p" }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], json!("processing"));
        assert_eq!(body["message"], json!("Download started in background"));
        let id = body["downloadId"].as_str().unwrap().to_string();

        let mut last = Value::Null;
        for _ in 0..200 {
            let (status, body) = get(app.clone(), &format!("/status/{}", id)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["downloadId"], json!(id));
            if body.get("result").is_some() {
                last = body;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(last["status"], json!("upload_skipped"), "job never finished: {last}");
        assert_eq!(last["result"]["state"], json!("upload_skipped"));
        assert_eq!(last["result"]["success"], json!(false));
        assert_eq!(last["result"]["videoInfo"]["title"], json!("Sample Clip"));
    }
}
