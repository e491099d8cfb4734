use url::Url;

use crate::common::error::AppError;

const VIDEO_ID_LEN: usize = 11;
const PATH_PREFIXES: &[&str] = &["shorts", "embed", "live", "v"];

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.trim_start_matches("www.").trim_start_matches("m.");
    host == "youtube.com" || host == "music.youtube.com" || host == "youtube-nocookie.com"
}

/// Extracts the 11-character video id from a URL or a bare id.
pub fn parse_video_id(input: &str) -> Result<String, AppError> {
    let input = input.trim();
    if is_video_id(input) {
        return Ok(input.to_string());
    }

    let invalid = || AppError::InvalidLocator(format!("could not find a video id in \"{}\"", input));

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    let url = Url::parse(&with_scheme).map_err(|_| invalid())?;
    let host = url.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());

    let candidate = if host == "youtu.be" || host == "www.youtu.be" {
        segments.next().map(str::to_string)
    } else if is_youtube_host(&host) {
        match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some(prefix) if PATH_PREFIXES.contains(&prefix) => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| is_video_id(id)).ok_or_else(invalid)
}
