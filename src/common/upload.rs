use std::path::Path;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::modules::download::model::{LocalArtifact, StoredObject};

pub const MAX_TITLE_CHARS: usize = 50;
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Durable object storage for finished artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Key prefix (folder) new objects land under.
    fn key_prefix(&self) -> &str;

    /// Persist `path` under `key`. Either the whole object becomes visible
    /// under `key` or an error is returned and nothing is.
    async fn put_file(&self, key: &str, path: &Path, size_bytes: u64, content_type: &str)
        -> Result<StoredObject, AppError>;
}

/// Keeps alphanumerics, space, hyphen and underscore; spaces become
/// underscores; capped at [`MAX_TITLE_CHARS`] characters.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end()
        .replace(' ', "_")
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

pub fn build_object_key(prefix: &str, at: OffsetDateTime, title: &str, job_id: Uuid, path: &Path) -> String {
    let stamp = format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    );
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let name = format!("{}_{}_{}{}", stamp, sanitize_title(title), job_id, extension);

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_CONTENT_TYPE)
        .to_string()
}

pub async fn upload_artifact(
    store: &dyn ArtifactStore,
    artifact: &LocalArtifact,
    job_id: Uuid,
    title: &str,
) -> Result<StoredObject, AppError> {
    let key = build_object_key(store.key_prefix(), OffsetDateTime::now_utc(), title, job_id, &artifact.path);
    let content_type = content_type_for(&artifact.path);

    info!(%job_id, key = %key, size = artifact.size_bytes, content_type = %content_type, "Uploading artifact");
    store
        .put_file(&key, &artifact.path, artifact.size_bytes, &content_type)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use time::macros::datetime;

    #[test]
    fn title_sanitisation() {
        assert_eq!(sanitize_title("Hello, World! (Official Video)"), "Hello_World_Official_Video");
        assert_eq!(sanitize_title("a/b\\c..d"), "abcd");
        assert_eq!(sanitize_title("trailing   "), "trailing");
        assert_eq!(sanitize_title("keep-this_one"), "keep-this_one");
        assert_eq!(sanitize_title("日本語 タイトル"), "日本語_タイトル");

        let long = "x".repeat(80);
        assert_eq!(sanitize_title(&long).chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn key_layout() {
        let id = Uuid::parse_str("8d7f1f7e-6a0e-4a4b-9a49-0d5c6c1b2a3f").unwrap();
        let at = datetime!(2026-03-04 05:06:07 UTC);
        let key = build_object_key("youtube_videos/", at, "My Clip", id, &PathBuf::from("/tmp/x/abc.webm"));
        assert_eq!(
            key,
            "youtube_videos/20260304_050607_My_Clip_8d7f1f7e-6a0e-4a4b-9a49-0d5c6c1b2a3f.webm"
        );

        let bare = build_object_key("", at, "t", id, &PathBuf::from("noext"));
        assert_eq!(bare, "20260304_050607_t_8d7f1f7e-6a0e-4a4b-9a49-0d5c6c1b2a3f");
    }

    #[test]
    fn same_title_same_second_different_jobs_do_not_collide() {
        let at = datetime!(2026-01-01 00:00:00 UTC);
        let path = PathBuf::from("v.mp4");
        let a = build_object_key("p", at, "Same Title", Uuid::new_v4(), &path);
        let b = build_object_key("p", at, "Same Title", Uuid::new_v4(), &path);
        assert_ne!(a, b);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("a.mp4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.webm")), "video/webm");
        assert_eq!(content_type_for(Path::new("a.unknownext")), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type_for(Path::new("noext")), FALLBACK_CONTENT_TYPE);
    }
}
