use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::enumerate::VideoRef;
use crate::error::{ErrorKind, ExportError};
use crate::fetch::{Fetcher, RateGovernor, RetryPolicy};
use crate::markdown::render_document;
use crate::providers::TranscriptProvider;
use crate::transcript::{normalize, TranscriptSegment};
use crate::writer::DocumentWriter;

/// Terminal result for one video. Produced exactly once per enumerated
/// VideoRef, success or failure.
#[derive(Debug)]
pub enum FetchOutcome {
    Success {
        video: VideoRef,
        segments: Vec<TranscriptSegment>,
        document_path: PathBuf,
    },
    Failure {
        video: VideoRef,
        kind: ErrorKind,
        message: String,
    },
}

impl FetchOutcome {
    pub fn video(&self) -> &VideoRef {
        match self {
            Self::Success { video, .. } | Self::Failure { video, .. } => video,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    fn failure(video: VideoRef, error: ExportError) -> Self {
        Self::Failure {
            video,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of a whole run, in enumeration order.
#[derive(Debug)]
pub struct BatchResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub outcomes: Vec<FetchOutcome>,
}

impl BatchResult {
    /// Failure counts grouped by error kind.
    pub fn failure_counts(&self) -> HashMap<ErrorKind, usize> {
        let mut counts = HashMap::new();
        for outcome in &self.outcomes {
            if let FetchOutcome::Failure { kind, .. } = outcome {
                *counts.entry(*kind).or_insert(0) += 1;
            }
        }
        counts
    }

    /// True when at least one video was requested and none succeeded.
    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.successful == 0
    }
}

/// Drives fetch → normalize → render → write for a batch of videos,
/// collecting one outcome per video without ever aborting the batch.
pub struct BatchExporter<P> {
    fetcher: Arc<Fetcher<P>>,
    writer: DocumentWriter,
}

impl<P: TranscriptProvider + 'static> BatchExporter<P> {
    pub fn new(provider: Arc<P>, config: &Config, output_dir: PathBuf) -> Self {
        let governor = Arc::new(RateGovernor::new(
            config.fetch.max_concurrent,
            config.fetch.min_delay(),
            config.fetch.max_delay(),
        ));
        let policy = RetryPolicy::new(config.fetch.retry_count, config.fetch.backoff_base());

        Self {
            fetcher: Arc::new(Fetcher::new(provider, governor, policy)),
            writer: DocumentWriter::new(output_dir, config.output.max_filename_len),
        }
    }

    /// The shared rate governor, exposed so callers can install a stop
    /// signal (e.g. on Ctrl-C).
    pub fn governor(&self) -> Arc<RateGovernor> {
        Arc::clone(self.fetcher.governor())
    }

    /// Process all videos and collect one outcome each.
    ///
    /// Results complete in whatever order the pool schedules them; the
    /// returned outcomes are re-sorted into enumeration order.
    pub async fn run(&self, videos: Vec<VideoRef>) -> Result<BatchResult> {
        let start_time = Instant::now();
        let total = videos.len();

        if total == 0 {
            warn!("No videos to process");
            return Ok(BatchResult {
                total: 0,
                successful: 0,
                failed: 0,
                outcomes: Vec::new(),
            });
        }

        self.writer.ensure_dir().await.map_err(anyhow::Error::new)?;
        info!("🚀 Exporting {} video(s) to {}", total, self.writer.dir().display());

        let (tx, mut rx) = mpsc::channel::<(usize, FetchOutcome)>(total);

        for (index, video) in videos.into_iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let writer = self.writer.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                info!("📹 Processing {}/{}: {}", index + 1, total, video.title);
                let outcome = process_one(&fetcher, &writer, video).await;
                if let Err(e) = tx.send((index, outcome)).await {
                    error!("Failed to record outcome: {}", e);
                }
            });
        }
        drop(tx);

        let mut slots: Vec<Option<FetchOutcome>> = (0..total).map(|_| None).collect();
        let mut completed = 0usize;
        while let Some((index, outcome)) = rx.recv().await {
            completed += 1;
            match &outcome {
                FetchOutcome::Success { video, segments, .. } => {
                    info!(
                        "✅ [{}/{}] {} ({} segments)",
                        completed,
                        total,
                        video.title,
                        segments.len()
                    );
                }
                FetchOutcome::Failure {
                    video,
                    kind,
                    message,
                } => {
                    warn!("❌ [{}/{}] {} ({}): {}", completed, total, video.title, kind, message);
                }
            }
            slots[index] = Some(outcome);
        }

        // Every enumerated video must resolve to an outcome, even if its
        // worker task died before sending one.
        let outcomes: Vec<FetchOutcome> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    error!("Worker for video #{} produced no outcome", index);
                    FetchOutcome::Failure {
                        video: VideoRef {
                            id: format!("#{}", index),
                            title: format!("video #{}", index),
                            url: String::new(),
                        },
                        kind: ErrorKind::ProviderError,
                        message: "worker task aborted".to_string(),
                    }
                })
            })
            .collect();

        let successful = outcomes.iter().filter(|o| o.is_success()).count();
        let result = BatchResult {
            total,
            successful,
            failed: total - successful,
            outcomes,
        };

        info!(
            "🎉 Batch finished in {:.1}s: {} ok, {} failed",
            start_time.elapsed().as_secs_f64(),
            result.successful,
            result.failed
        );

        Ok(result)
    }
}

/// One video's full pipeline: fetch, normalize, render, write.
async fn process_one<P: TranscriptProvider>(
    fetcher: &Fetcher<P>,
    writer: &DocumentWriter,
    video: VideoRef,
) -> FetchOutcome {
    let raw = match fetcher.fetch(&video).await {
        Ok(raw) => raw,
        Err(e) => return FetchOutcome::failure(video, e),
    };

    let segments = match normalize(&raw) {
        Ok(segments) => segments,
        Err(e) => return FetchOutcome::failure(video, e),
    };

    if segments.is_empty() {
        return FetchOutcome::failure(
            video,
            ExportError::NoTranscript("transcript empty after normalization".to_string()),
        );
    }

    let content = render_document(&video, &segments);
    match writer.write_document(&video.title, &content).await {
        Ok(document_path) => FetchOutcome::Success {
            video,
            segments,
            document_path,
        },
        Err(e) => FetchOutcome::failure(video, e),
    }
}
