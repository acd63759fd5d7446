use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::error::ExportError;

/// Reference to a channel, kept as the full URL since channel pages are
/// addressed by id, legacy custom name, or handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    /// Original channel URL, used to fetch the channel's videos tab.
    pub url: String,
    /// Short label for the channel (handle or trailing path segment).
    pub label: String,
}

/// Classification of an input URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlKind {
    /// A single video, by 11-character video id.
    Video(String),
    /// A playlist, by `list=` id.
    Playlist(String),
    /// A channel page.
    Channel(ChannelRef),
}

fn video_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:v=|/shorts/|youtu\.be/)([0-9A-Za-z_-]{11})").unwrap())
}

fn playlist_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]list=([0-9A-Za-z_-]+)").unwrap())
}

fn channel_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/(?:channel/([0-9A-Za-z_-]+)|c/([^/?#]+)|user/([^/?#]+)|(@[A-Za-z0-9._-]+))")
            .unwrap()
    })
}

/// Classify a YouTube URL into video, playlist, or channel and extract the
/// canonical identifier. Pure function, no network access.
///
/// A watch URL carrying both `v=` and `list=` classifies as a playlist, the
/// list being the broader request. Unknown hosts and unmatched paths fail
/// with [`ExportError::InvalidUrl`].
pub fn classify(input: &str) -> Result<UrlKind, ExportError> {
    let parsed =
        Url::parse(input).map_err(|_| ExportError::InvalidUrl(input.to_string()))?;

    let host = parsed.host_str().unwrap_or("");
    let known_host = host == "youtu.be"
        || host == "youtube.com"
        || host.ends_with(".youtube.com");
    if !known_host {
        return Err(ExportError::InvalidUrl(input.to_string()));
    }

    if let Some(caps) = playlist_id_re().captures(input) {
        return Ok(UrlKind::Playlist(caps[1].to_string()));
    }

    let video_id = video_id_re().captures(input).map(|c| c[1].to_string());

    if let Some(caps) = channel_path_re().captures(input) {
        if video_id.is_none() {
            let label = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "Channel".to_string());
            return Ok(UrlKind::Channel(ChannelRef {
                url: input.to_string(),
                label,
            }));
        }
    }

    if let Some(id) = video_id {
        return Ok(UrlKind::Video(id));
    }

    Err(ExportError::InvalidUrl(input.to_string()))
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
