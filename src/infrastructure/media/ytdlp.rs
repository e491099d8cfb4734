use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CaptionRef, MediaSource, Probe};
use crate::common::error::{classify_upstream_error, AppError};
use crate::infrastructure::egress::EgressPath;
use crate::modules::download::format::{FormatChoice, MediaFormat};
use crate::modules::download::model::ResourceMetadata;

const SOCKET_TIMEOUT_SECS: &str = "30";

// Runs the yt-dlp executable; requires it on PATH or at the configured location.
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
    probe_timeout: Duration,
    download_timeout: Duration,
}

#[derive(Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    view_count: Option<u64>,
    webpage_url: Option<String>,
    formats: Option<Vec<RawFormat>>,
    subtitles: Option<HashMap<String, Vec<RawCaption>>>,
    automatic_captions: Option<HashMap<String, Vec<RawCaption>>>,
}

#[derive(Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    ext: Option<String>,
    height: Option<u32>,
    vcodec: Option<String>,
    acodec: Option<String>,
    tbr: Option<f64>,
    abr: Option<f64>,
    format_note: Option<String>,
}

#[derive(Deserialize)]
struct RawCaption {
    ext: Option<String>,
    url: Option<String>,
}

impl YtDlp {
    pub fn new(bin: impl Into<String>, probe_timeout: Duration, download_timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            probe_timeout,
            download_timeout,
        }
    }

    fn command(&self, egress: &EgressPath) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--no-playlist")
            .arg("--no-warnings")
            .arg("--socket-timeout")
            .arg(SOCKET_TIMEOUT_SECS)
            // An empty proxy forces a direct connection even when env proxies are set.
            .arg("--proxy")
            .arg(egress.proxy_url().unwrap_or(""))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, limit: Duration, what: &str) -> Result<Vec<u8>, AppError> {
        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(bin = %self.bin, error = %e, "Failed to launch extractor");
                return Err(AppError::UpstreamUnavailable(format!(
                    "extractor could not be started: {}",
                    e
                )));
            }
            Err(_) => {
                return Err(AppError::UpstreamUnavailable(format!(
                    "{} timed out after {}s",
                    what,
                    limit.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(status = %output.status, stderr = %stderr.trim(), "Extractor exited with failure");
            return Err(classify_upstream_error(&stderr));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaSource for YtDlp {
    async fn probe(&self, target: &str, egress: &EgressPath) -> Result<Probe, AppError> {
        let mut cmd = self.command(egress);
        cmd.arg("--dump-single-json").arg("--skip-download").arg(target);

        let stdout = self.run(cmd, self.probe_timeout, "metadata probe").await?;
        parse_probe(&stdout, target)
    }

    async fn download(
        &self,
        target: &str,
        choice: &FormatChoice,
        egress: &EgressPath,
        output_template: &Path,
    ) -> Result<(), AppError> {
        let mut cmd = self.command(egress);
        cmd.arg("-f")
            .arg(&choice.selector)
            .arg("--no-progress")
            .arg("--no-mtime")
            .arg("--no-part")
            .arg("--retries")
            .arg("1")
            .arg("-o")
            .arg(output_template)
            .arg(target);

        self.run(cmd, self.download_timeout, "download").await?;
        Ok(())
    }
}

fn parse_probe(stdout: &[u8], target: &str) -> Result<Probe, AppError> {
    let raw: RawInfo = serde_json::from_slice(stdout).map_err(|e| {
        AppError::UpstreamUnavailable(format!("unreadable probe output: {}", e))
    })?;

    let metadata = ResourceMetadata::from_parts(
        raw.title,
        raw.duration,
        raw.uploader.or(raw.channel),
        raw.view_count,
        raw.webpage_url,
        target,
    );

    let formats = raw
        .formats
        .unwrap_or_default()
        .into_iter()
        .filter_map(convert_format)
        .collect();

    Ok(Probe {
        metadata,
        formats,
        subtitles: convert_captions(raw.subtitles),
        automatic_captions: convert_captions(raw.automatic_captions),
    })
}

// Containers that carry a picture even when the extractor reports neither codec nor height.
const VIDEO_CONTAINERS: &[&str] = &["mp4", "webm", "mkv", "mov", "flv", "avi", "3gp", "m4v", "ts"];

fn convert_format(raw: RawFormat) -> Option<MediaFormat> {
    let format_id = raw.format_id?;
    let ext = raw.ext.unwrap_or_default();
    if ext == "mhtml" || raw.format_note.as_deref() == Some("storyboard") {
        return None;
    }

    let has_video = match raw.vcodec.as_deref() {
        Some("none") => false,
        Some(_) => true,
        None => raw.height.is_some() || VIDEO_CONTAINERS.contains(&ext.as_str()),
    };
    let has_audio = match raw.acodec.as_deref() {
        Some("none") => false,
        Some(_) => true,
        // Generic extractors often omit codecs for single muxed files.
        None => true,
    };

    Some(MediaFormat {
        format_id,
        ext,
        height: raw.height,
        has_video,
        has_audio,
        bitrate: raw.tbr,
        audio_bitrate: raw.abr,
    })
}

fn convert_captions(raw: Option<HashMap<String, Vec<RawCaption>>>) -> HashMap<String, Vec<CaptionRef>> {
    raw.unwrap_or_default()
        .into_iter()
        .map(|(lang, tracks)| {
            let tracks = tracks
                .into_iter()
                .filter_map(|t| {
                    Some(CaptionRef {
                        ext: t.ext?,
                        url: t.url?,
                    })
                })
                .collect();
            (lang, tracks)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "title": "Rust in 100 Seconds",
        "duration": 75.0,
        "uploader": null,
        "channel": "Fireship",
        "view_count": 1234,
        "webpage_url": "https://www.youtube.com/watch?v=5C_HPTJg5ek",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "format_note": "storyboard", "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5, "tbr": 129.5},
            {"format_id": "137", "ext": "mp4", "height": 1080, "vcodec": "avc1.640028", "acodec": "none", "tbr": 2300.1},
            {"format_id": "18", "ext": "mp4", "height": 360, "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "tbr": 500.0}
        ],
        "subtitles": {"en": [{"ext": "json3", "url": "https://example.test/en.json3"}, {"ext": "vtt"}]},
        "automatic_captions": null
    }"#;

    #[test]
    fn probe_output_is_normalised() {
        let probe = parse_probe(SAMPLE.as_bytes(), "https://youtu.be/5C_HPTJg5ek").unwrap();
        let meta = &probe.metadata;
        assert_eq!(meta.title, "Rust in 100 Seconds");
        assert_eq!(meta.duration_seconds, 75);
        assert_eq!(meta.owner_name, "Fireship");
        assert_eq!(meta.view_count, 1234);
        assert_eq!(meta.source_url, "https://www.youtube.com/watch?v=5C_HPTJg5ek");
        assert!(!meta.is_short_form);

        let ids: Vec<&str> = probe.formats.iter().map(|f| f.format_id.as_str()).collect();
        assert_eq!(ids, vec!["140", "137", "18"]);
        let audio = &probe.formats[0];
        assert!(audio.has_audio && !audio.has_video);
        let video_only = &probe.formats[1];
        assert!(video_only.has_video && !video_only.has_audio);

        assert_eq!(probe.subtitles["en"].len(), 1);
        assert_eq!(probe.subtitles["en"][0].ext, "json3");
        assert!(probe.automatic_captions.is_empty());
    }

    #[test]
    fn codecless_formats_are_judged_by_container() {
        let raw = r#"{
            "title": "clip",
            "formats": [
                {"format_id": "http-mp4", "ext": "mp4"},
                {"format_id": "http-webm", "ext": "webm"},
                {"format_id": "http-m4a", "ext": "m4a"},
                {"format_id": "http-mp3", "ext": "mp3"}
            ]
        }"#;
        let probe = parse_probe(raw.as_bytes(), "https://example.test/clip").unwrap();
        let by_id = |id: &str| probe.formats.iter().find(|f| f.format_id == id).unwrap();

        assert!(by_id("http-mp4").has_video && by_id("http-mp4").has_audio);
        assert!(by_id("http-webm").has_video);
        assert!(!by_id("http-m4a").has_video && by_id("http-m4a").has_audio);
        assert!(!by_id("http-mp3").has_video);
    }

    #[test]
    fn garbage_output_is_upstream_unavailable() {
        let err = parse_probe(b"not json", "u").unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_reported_not_panicked() {
        let ytdlp = YtDlp::new(
            "/nonexistent/yt-dlp-binary",
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        let err = ytdlp.probe("https://youtu.be/abc", &EgressPath::direct()).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
    }
}
