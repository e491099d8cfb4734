use super::model::{Quality, BEST_HEIGHT_CAP};

pub const PREFERRED_CONTAINER: &str = "mp4";

/// One downloadable representation as advertised by the probe.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFormat {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    pub has_video: bool,
    pub has_audio: bool,
    /// Total bitrate in kbit/s.
    pub bitrate: Option<f64>,
    pub audio_bitrate: Option<f64>,
}

impl MediaFormat {
    fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    fn is_preferred_container(&self) -> bool {
        self.ext.eq_ignore_ascii_case(PREFERRED_CONTAINER)
    }
}

/// The representation picked for download and the selector handed to the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatChoice {
    pub format_id: String,
    pub ext: String,
    pub height: Option<u32>,
    pub selector: String,
}

impl FormatChoice {
    fn from_format(f: &MediaFormat) -> Self {
        // Video-only streams get the best audio merged in when the extractor can.
        let selector = if f.has_video && !f.has_audio {
            format!("{id}+bestaudio/{id}", id = f.format_id)
        } else {
            f.format_id.clone()
        };
        Self {
            format_id: f.format_id.clone(),
            ext: f.ext.clone(),
            height: f.height,
            selector,
        }
    }
}

pub fn select_format(formats: &[MediaFormat], quality: Quality, audio_only: bool) -> Option<FormatChoice> {
    if audio_only {
        if let Some(best) = formats
            .iter()
            .filter(|f| f.is_audio_only())
            .max_by(|a, b| audio_rate(a).total_cmp(&audio_rate(b)))
        {
            return Some(FormatChoice::from_format(best));
        }
    }

    let video: Vec<&MediaFormat> = formats.iter().filter(|f| f.has_video).collect();
    let pool: Vec<&MediaFormat> = if video.is_empty() {
        formats.iter().collect()
    } else {
        video
    };

    let picked = match quality {
        Quality::Worst => lowest(&pool),
        Quality::Best => capped_chain(&pool, BEST_HEIGHT_CAP),
        Quality::Height(cap) => capped_chain(&pool, cap),
    };
    picked.map(FormatChoice::from_format)
}

/// (height <= cap, mp4) -> (height <= cap, any) -> (mp4, any height) -> anything.
///
/// The capped tiers only look at the tallest height under the cap, so a taller
/// non-preferred container beats a shorter preferred one.
fn capped_chain<'a>(pool: &[&'a MediaFormat], cap: u32) -> Option<&'a MediaFormat> {
    let capped: Vec<&MediaFormat> = pool
        .iter()
        .copied()
        .filter(|f| f.height.is_some_and(|h| h <= cap))
        .collect();

    if let Some(top) = capped.iter().filter_map(|f| f.height).max() {
        let at_top: Vec<&MediaFormat> = capped
            .into_iter()
            .filter(|f| f.height == Some(top))
            .collect();
        let preferred: Vec<&MediaFormat> = at_top
            .iter()
            .copied()
            .filter(|f| f.is_preferred_container())
            .collect();
        if let Some(f) = richest(&preferred) {
            return Some(f);
        }
        return richest(&at_top);
    }

    let preferred: Vec<&MediaFormat> = pool
        .iter()
        .copied()
        .filter(|f| f.is_preferred_container())
        .collect();
    if let Some(f) = closest_above(&preferred, cap) {
        return Some(f);
    }
    closest_above(pool, cap)
}

/// Among candidates, prefer muxed audio, then the higher bitrate.
fn richest<'a>(candidates: &[&'a MediaFormat]) -> Option<&'a MediaFormat> {
    candidates.iter().copied().max_by(|a, b| {
        a.has_audio
            .cmp(&b.has_audio)
            .then(total_rate(a).total_cmp(&total_rate(b)))
    })
}

/// Nothing fits under the cap: take the smallest step over it, unknown heights last.
fn closest_above<'a>(candidates: &[&'a MediaFormat], cap: u32) -> Option<&'a MediaFormat> {
    candidates.iter().copied().min_by(|a, b| {
        let da = a.height.map(|h| h.saturating_sub(cap)).unwrap_or(u32::MAX);
        let db = b.height.map(|h| h.saturating_sub(cap)).unwrap_or(u32::MAX);
        da.cmp(&db)
            .then(b.has_audio.cmp(&a.has_audio))
            .then(total_rate(b).total_cmp(&total_rate(a)))
    })
}

fn lowest<'a>(pool: &[&'a MediaFormat]) -> Option<&'a MediaFormat> {
    pool.iter().copied().min_by(|a, b| {
        let ha = a.height.unwrap_or(u32::MAX);
        let hb = b.height.unwrap_or(u32::MAX);
        ha.cmp(&hb).then(total_rate(a).total_cmp(&total_rate(b)))
    })
}

fn audio_rate(f: &MediaFormat) -> f64 {
    f.audio_bitrate.or(f.bitrate).unwrap_or(0.0)
}

fn total_rate(f: &MediaFormat) -> f64 {
    f.bitrate.unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, ext: &str, height: u32, audio: bool, rate: f64) -> MediaFormat {
        MediaFormat {
            format_id: id.to_string(),
            ext: ext.to_string(),
            height: Some(height),
            has_video: true,
            has_audio: audio,
            bitrate: Some(rate),
            audio_bitrate: None,
        }
    }

    fn audio(id: &str, ext: &str, abr: f64) -> MediaFormat {
        MediaFormat {
            format_id: id.to_string(),
            ext: ext.to_string(),
            height: None,
            has_video: false,
            has_audio: true,
            bitrate: Some(abr),
            audio_bitrate: Some(abr),
        }
    }

    #[test]
    fn taller_webm_beats_shorter_mp4_under_cap() {
        let formats = vec![
            video("22", "mp4", 720, true, 1500.0),
            video("248", "webm", 1080, false, 2500.0),
        ];
        let choice = select_format(&formats, Quality::Height(1080), false).unwrap();
        assert_eq!(choice.format_id, "248");
        assert_eq!(choice.ext, "webm");
        assert_eq!(choice.selector, "248+bestaudio/248");
    }

    #[test]
    fn preferred_container_wins_at_equal_height() {
        let formats = vec![
            video("248", "webm", 1080, false, 3000.0),
            video("137", "mp4", 1080, false, 2000.0),
            video("399", "mp4", 1440, false, 5000.0),
        ];
        let choice = select_format(&formats, Quality::Best, false).unwrap();
        assert_eq!(choice.format_id, "137");
    }

    #[test]
    fn over_cap_falls_back_to_preferred_container() {
        let formats = vec![
            video("313", "webm", 2160, false, 9000.0),
            video("401", "mp4", 2160, false, 8000.0),
            video("400", "mp4", 1440, false, 6000.0),
        ];
        let choice = select_format(&formats, Quality::Height(360), false).unwrap();
        assert_eq!(choice.format_id, "400");
    }

    #[test]
    fn over_cap_without_preferred_container_takes_anything() {
        let formats = vec![
            video("313", "webm", 2160, false, 9000.0),
            video("271", "webm", 1440, false, 6000.0),
        ];
        let choice = select_format(&formats, Quality::Height(240), false).unwrap();
        assert_eq!(choice.format_id, "271");
    }

    #[test]
    fn muxed_stream_needs_no_merge() {
        let formats = vec![video("18", "mp4", 360, true, 500.0)];
        let choice = select_format(&formats, Quality::Best, false).unwrap();
        assert_eq!(choice.selector, "18");
    }

    #[test]
    fn worst_picks_lowest_height() {
        let formats = vec![
            video("18", "mp4", 360, true, 500.0),
            video("160", "mp4", 144, false, 100.0),
            video("22", "mp4", 720, true, 1500.0),
        ];
        let choice = select_format(&formats, Quality::Worst, false).unwrap();
        assert_eq!(choice.format_id, "160");
    }

    #[test]
    fn audio_only_picks_highest_bitrate() {
        let formats = vec![
            audio("139", "m4a", 48.0),
            audio("251", "webm", 160.0),
            audio("140", "m4a", 128.0),
            video("18", "mp4", 360, true, 500.0),
        ];
        let choice = select_format(&formats, Quality::Best, true).unwrap();
        assert_eq!(choice.format_id, "251");
        assert_eq!(choice.selector, "251");
    }

    #[test]
    fn audio_only_without_audio_streams_uses_video_chain() {
        let formats = vec![video("18", "mp4", 360, true, 500.0)];
        let choice = select_format(&formats, Quality::Best, true).unwrap();
        assert_eq!(choice.format_id, "18");
    }

    #[test]
    fn nothing_available() {
        assert!(select_format(&[], Quality::Best, false).is_none());
        assert!(select_format(&[], Quality::Best, true).is_none());
    }
}
