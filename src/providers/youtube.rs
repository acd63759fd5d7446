use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

use super::{MetadataProvider, RawSegment, TranscriptError, TranscriptProvider, VideoEntry};
use crate::config::FetchConfig;
use crate::urls::watch_url;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const BROWSE_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/browse";

/// Web client version sent with continuation requests.
const WEB_CLIENT_VERSION: &str = "2.20240101.00.00";

fn api_key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""INNERTUBE_API_KEY":"([^"]+)""#).unwrap())
}

/// YouTube-backed implementation of both provider traits.
///
/// Playlists and channels are listed from the page's embedded initial data
/// plus browse-endpoint continuations; single-video titles come from the
/// oEmbed endpoint; transcripts come from the watch page's caption track
/// list fetched in `json3` format.
pub struct YouTubeClient {
    http: Client,
    /// Subtitle language preference order
    languages: Vec<String>,
    /// Translation target when no preferred language is natively available
    translate_to: Option<String>,
    /// Stop paging listings past this many entries (0 = unlimited)
    max_videos: usize,
}

impl YouTubeClient {
    pub fn new(config: &FetchConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            languages: config.languages.clone(),
            translate_to: config.translate_to.clone(),
            max_videos: config.max_videos,
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, TranscriptError> {
        let response = self
            .http
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| TranscriptError::Other(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                Err(TranscriptError::Throttled(format!("HTTP 429 from {}", url)))
            }
            status if !status.is_success() => {
                Err(TranscriptError::Other(format!("HTTP {} from {}", status, url)))
            }
            _ => response
                .text()
                .await
                .map_err(|e| TranscriptError::Other(e.to_string())),
        }
    }

    /// List one renderer kind across the initial page and its continuations.
    async fn list_renderers(&self, page_url: &str, renderer_key: &str) -> Result<Vec<VideoEntry>> {
        let html = self.get_text(page_url).await?;
        let initial = extract_json_object(&html, "ytInitialData")
            .ok_or_else(|| anyhow!("no initial data found at {}", page_url))?;

        let mut entries = Vec::new();
        let mut continuation = collect_page(&initial, renderer_key, &mut entries);

        let api_key = api_key_re()
            .captures(&html)
            .map(|caps| caps[1].to_string());

        while let Some(token) = continuation {
            if self.max_videos > 0 && entries.len() >= self.max_videos {
                debug!("Listing cap of {} reached, not paging further", self.max_videos);
                break;
            }
            let Some(ref key) = api_key else {
                warn!("No API key on {}, returning first page only", page_url);
                break;
            };

            let before = entries.len();
            let page = self.browse_continuation(key, &token).await?;
            continuation = collect_page(&page, renderer_key, &mut entries);

            // A continuation that adds nothing will never make progress
            if entries.len() == before {
                break;
            }
        }

        Ok(entries)
    }

    async fn browse_continuation(&self, api_key: &str, token: &str) -> Result<Value> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": "WEB",
                    "clientVersion": WEB_CLIENT_VERSION,
                }
            },
            "continuation": token,
        });

        let response = self
            .http
            .post(format!("{}?key={}", BROWSE_ENDPOINT, api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("browse continuation failed: HTTP {}", response.status()));
        }

        Ok(response.json().await?)
    }

    /// Pick a caption track URL: first native match in preference order,
    /// then a translatable track translated to the target language, then
    /// whatever is published.
    fn select_track(&self, tracks: &[Value]) -> Option<String> {
        for lang in &self.languages {
            for track in tracks {
                let code = track.get("languageCode").and_then(Value::as_str).unwrap_or("");
                if code == lang || code.starts_with(&format!("{}-", lang)) {
                    return base_url(track);
                }
            }
        }

        let target = self
            .translate_to
            .as_deref()
            .or_else(|| self.languages.first().map(String::as_str));
        if let Some(target) = target {
            let translatable = tracks
                .iter()
                .find(|t| t.get("isTranslatable").and_then(Value::as_bool) == Some(true));
            if let Some(url) = translatable.and_then(base_url) {
                debug!("No native track, requesting translation to {}", target);
                return Some(format!("{}&tlang={}", url, target));
            }
        }

        tracks.first().and_then(base_url)
    }
}

#[async_trait]
impl MetadataProvider for YouTubeClient {
    async fn list_playlist(&self, playlist_id: &str) -> Result<Vec<VideoEntry>> {
        let url = format!("https://www.youtube.com/playlist?list={}", playlist_id);
        self.list_renderers(&url, "playlistVideoRenderer").await
    }

    async fn list_channel(&self, channel_url: &str) -> Result<Vec<VideoEntry>> {
        let url = if channel_url.trim_end_matches('/').ends_with("/videos") {
            channel_url.to_string()
        } else {
            format!("{}/videos", channel_url.trim_end_matches('/'))
        };
        self.list_renderers(&url, "videoRenderer").await
    }

    async fn video_title(&self, video_id: &str) -> Result<String> {
        let url = format!(
            "https://www.youtube.com/oembed?url={}&format=json",
            urlencoding::encode(&watch_url(video_id))
        );
        let body = self.get_text(&url).await?;
        let value: Value = serde_json::from_str(&body)?;
        value
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("oEmbed response has no title for {}", video_id))
    }
}

#[async_trait]
impl TranscriptProvider for YouTubeClient {
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<RawSegment>, TranscriptError> {
        let html = self.get_text(&watch_url(video_id)).await?;
        let player = extract_json_object(&html, "ytInitialPlayerResponse").ok_or_else(|| {
            TranscriptError::Other(format!("no player response on watch page for {}", video_id))
        })?;

        let tracks = player
            .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
            .and_then(Value::as_array)
            .filter(|tracks| !tracks.is_empty())
            .ok_or_else(|| {
                let status = player
                    .pointer("/playabilityStatus/status")
                    .and_then(Value::as_str)
                    .unwrap_or("UNKNOWN");
                if status == "OK" {
                    TranscriptError::Disabled(format!("no caption tracks published for {}", video_id))
                } else {
                    TranscriptError::Unavailable(format!("video {} not playable: {}", video_id, status))
                }
            })?;

        let track_url = self.select_track(tracks).ok_or_else(|| {
            TranscriptError::Unavailable(format!("no usable caption track for {}", video_id))
        })?;

        let body = self.get_text(&format!("{}&fmt=json3", track_url)).await?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| TranscriptError::Other(format!("caption payload not JSON: {}", e)))?;

        let events = value
            .get("events")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TranscriptError::Unavailable(format!("caption track for {} is empty", video_id))
            })?;

        // Only caption events carry text runs; style and window events do not
        let segments: Vec<RawSegment> = events
            .iter()
            .filter(|event| event.get("segs").is_some())
            .cloned()
            .collect();

        if segments.is_empty() {
            return Err(TranscriptError::Unavailable(format!(
                "caption track for {} has no text events",
                video_id
            )));
        }

        Ok(segments)
    }
}

/// Extract the JSON object literal following `marker` in page HTML by
/// balanced-brace scanning, skipping braces inside string literals.
fn extract_json_object(html: &str, marker: &str) -> Option<Value> {
    let at = html.find(marker)?;
    let rest = &html[at + marker.len()..];
    let open = rest.find('{')?;

    let bytes = rest.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return serde_json::from_str(&rest[open..=i]).ok();
                    }
                }
                _ => {}
            }
        }
    }

    None
}

/// Collect video entries for `renderer_key` and return the next
/// continuation token, if any.
fn collect_page(page: &Value, renderer_key: &str, out: &mut Vec<VideoEntry>) -> Option<String> {
    let mut renderers = Vec::new();
    collect_objects(page, renderer_key, &mut renderers);
    for renderer in renderers {
        if let Some(entry) = entry_from_renderer(renderer) {
            out.push(entry);
        }
    }

    let mut commands = Vec::new();
    collect_objects(page, "continuationCommand", &mut commands);
    commands
        .first()
        .and_then(|cmd| cmd.get("token"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Depth-first collection of every value stored under `key`.
fn collect_objects<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == key {
                    out.push(v);
                }
                collect_objects(v, key, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_objects(v, key, out);
            }
        }
        _ => {}
    }
}

fn entry_from_renderer(renderer: &Value) -> Option<VideoEntry> {
    let video_id = renderer.get("videoId").and_then(Value::as_str)?;
    let title = renderer.get("title").map(runs_text).unwrap_or_default();
    Some(VideoEntry {
        video_id: video_id.to_string(),
        title,
    })
}

/// Text of a title value, which is either `{simpleText}` or `{runs: [{text}]}`.
fn runs_text(title: &Value) -> String {
    if let Some(text) = title.get("simpleText").and_then(Value::as_str) {
        return text.to_string();
    }
    title
        .get("runs")
        .and_then(Value::as_array)
        .and_then(|runs| runs.first())
        .and_then(|run| run.get("text"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn base_url(track: &Value) -> Option<String> {
    track
        .get("baseUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
}
