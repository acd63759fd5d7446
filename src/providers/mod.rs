pub mod youtube;

use async_trait::async_trait;
use thiserror::Error;

pub use youtube::YouTubeClient;

/// Provider-native transcript segment record. Shapes differ across provider
/// versions, so records stay as raw JSON until the normalizer runs.
pub type RawSegment = serde_json::Value;

/// One video listed by the metadata provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub video_id: String,
    pub title: String,
}

/// Error signals from the transcript provider, classified for retry policy.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// Upstream throttling (HTTP 429 or equivalent). Retryable with backoff.
    #[error("throttled by upstream: {0}")]
    Throttled(String),

    /// The video has no subtitle track. Not retryable.
    #[error("no transcript available: {0}")]
    Unavailable(String),

    /// Subtitles are disabled for the video. Not retryable.
    #[error("transcripts disabled: {0}")]
    Disabled(String),

    /// Any other provider failure. Retried once.
    #[error("provider error: {0}")]
    Other(String),
}

/// Lists the videos behind a playlist or channel reference and resolves
/// single-video titles.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// List a playlist's videos in playlist order.
    async fn list_playlist(&self, playlist_id: &str) -> anyhow::Result<Vec<VideoEntry>>;

    /// List a channel's videos in the order the provider returns them
    /// (newest first in practice, but not guaranteed).
    async fn list_channel(&self, channel_url: &str) -> anyhow::Result<Vec<VideoEntry>>;

    /// Title of a single video.
    async fn video_title(&self, video_id: &str) -> anyhow::Result<String>;
}

/// Retrieves one video's raw transcript segments.
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    async fn fetch_segments(&self, video_id: &str) -> Result<Vec<RawSegment>, TranscriptError>;
}

#[async_trait]
impl<T: MetadataProvider + ?Sized> MetadataProvider for std::sync::Arc<T> {
    async fn list_playlist(&self, playlist_id: &str) -> anyhow::Result<Vec<VideoEntry>> {
        (**self).list_playlist(playlist_id).await
    }

    async fn list_channel(&self, channel_url: &str) -> anyhow::Result<Vec<VideoEntry>> {
        (**self).list_channel(channel_url).await
    }

    async fn video_title(&self, video_id: &str) -> anyhow::Result<String> {
        (**self).video_title(video_id).await
    }
}
