/// ytsub - YouTube subtitle exporter
///
/// Resolves a video, playlist, or channel URL into its videos, fetches each
/// video's subtitle track under a rate-governed worker pool, and renders one
/// timestamped Markdown document per video.

pub mod config;
pub mod enumerate;
pub mod error;
pub mod fetch;
pub mod markdown;
pub mod pipeline;
pub mod providers;
pub mod transcript;
pub mod urls;
pub mod writer;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder};
pub use crate::enumerate::{Enumerator, ResolvedInput, VideoRef};
pub use crate::error::{ErrorKind, ExportError};
pub use crate::fetch::{Fetcher, RateGovernor, RetryPolicy};
pub use crate::pipeline::{BatchExporter, BatchResult, FetchOutcome};
pub use crate::providers::{MetadataProvider, TranscriptProvider, YouTubeClient};
pub use crate::transcript::TranscriptSegment;
pub use crate::writer::DocumentWriter;
