use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ExportError;
use crate::providers::MetadataProvider;
use crate::urls::{classify, watch_url, UrlKind};

/// One video to process, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// A resolved input: the videos to process plus a label describing the
/// collection they came from (used to derive a default output directory).
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub videos: Vec<VideoRef>,
    pub collection_label: String,
}

/// Expands a URL into the ordered list of videos it refers to.
pub struct Enumerator<P> {
    provider: P,
    /// Cap on enumerated videos (0 = unlimited)
    max_videos: usize,
}

impl<P: MetadataProvider> Enumerator<P> {
    pub fn new(provider: P, max_videos: usize) -> Self {
        Self {
            provider,
            max_videos,
        }
    }

    /// Classify the input URL and expand it into VideoRefs.
    ///
    /// Playlist order is preserved; channel order is whatever the provider
    /// returns. Entries with missing ids are skipped with a warning rather
    /// than aborting enumeration. Provider failures on the root input map to
    /// [`ExportError::EnumerationFailed`].
    pub async fn resolve(&self, input: &str) -> Result<ResolvedInput, ExportError> {
        match classify(input)? {
            UrlKind::Video(video_id) => {
                info!("🎬 Resolving single video: {}", video_id);
                let title = match self.provider.video_title(&video_id).await {
                    Ok(title) => title,
                    Err(e) => {
                        warn!("Title lookup failed for {}, using fallback: {}", video_id, e);
                        format!("Video_{}", video_id)
                    }
                };
                Ok(ResolvedInput {
                    videos: vec![VideoRef {
                        url: watch_url(&video_id),
                        id: video_id,
                        title,
                    }],
                    collection_label: "Single_Video".to_string(),
                })
            }
            UrlKind::Playlist(playlist_id) => {
                info!("📋 Enumerating playlist: {}", playlist_id);
                let entries = self
                    .provider
                    .list_playlist(&playlist_id)
                    .await
                    .map_err(|e| ExportError::EnumerationFailed(e.to_string()))?;
                Ok(ResolvedInput {
                    videos: self.collect(entries),
                    collection_label: format!("Playlist_{}", playlist_id),
                })
            }
            UrlKind::Channel(channel) => {
                info!("📺 Enumerating channel: {}", channel.label);
                let entries = self
                    .provider
                    .list_channel(&channel.url)
                    .await
                    .map_err(|e| ExportError::EnumerationFailed(e.to_string()))?;
                Ok(ResolvedInput {
                    videos: self.collect(entries),
                    collection_label: format!("Channel_{}", channel.label),
                })
            }
        }
    }

    fn collect(&self, entries: Vec<crate::providers::VideoEntry>) -> Vec<VideoRef> {
        let mut videos = Vec::with_capacity(entries.len());

        for entry in entries {
            if entry.video_id.is_empty() {
                warn!("Skipping listing entry with no video id: {:?}", entry.title);
                continue;
            }
            if self.max_videos > 0 && videos.len() >= self.max_videos {
                info!("Reached max_videos cap of {}, stopping", self.max_videos);
                break;
            }
            let title = if entry.title.is_empty() {
                "Unknown".to_string()
            } else {
                entry.title
            };
            videos.push(VideoRef {
                url: watch_url(&entry.video_id),
                id: entry.video_id,
                title,
            });
        }

        videos
    }
}
