use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, warn};

use crate::enumerate::VideoRef;
use crate::error::ExportError;
use crate::providers::{RawSegment, TranscriptError, TranscriptProvider};

/// Upper cap on any single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Fraction of a backoff delay used as jitter amplitude.
const JITTER_FACTOR: f64 = 0.25;

/// Shared rate-limiting state for all fetch tasks: a permit pool bounding
/// in-flight requests plus the jittered pre-request delay range.
///
/// Owned explicitly and shared by `Arc`, never a module-level singleton.
/// Stopping closes the permit pool: in-flight permits stay valid and their
/// requests run to completion, while queued acquisitions fail with
/// [`ExportError::Cancelled`].
pub struct RateGovernor {
    semaphore: Semaphore,
    min_delay: Duration,
    max_delay: Duration,
}

impl RateGovernor {
    pub fn new(max_concurrent: usize, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrent),
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    /// Acquire a permit for one video's fetch. Fails with `Cancelled` once
    /// the governor has been stopped.
    pub async fn admit(&self) -> Result<SemaphorePermit<'_>, ExportError> {
        if self.semaphore.is_closed() {
            return Err(ExportError::Cancelled);
        }
        self.semaphore
            .acquire()
            .await
            .map_err(|_| ExportError::Cancelled)
    }

    /// Stop admitting new fetches. Already-admitted fetches are unaffected.
    pub fn stop(&self) {
        self.semaphore.close();
    }

    pub fn is_stopped(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Sleep for a random duration in the configured delay range,
    /// desynchronizing request timing across workers.
    pub async fn pre_request_delay(&self) {
        let delay = self.jittered_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn jittered_delay(&self) -> Duration {
        if self.max_delay.is_zero() {
            return Duration::ZERO;
        }
        let min = self.min_delay.as_secs_f64();
        let max = self.max_delay.as_secs_f64();
        let secs = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            max
        };
        Duration::from_secs_f64(secs)
    }
}

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    None,
    /// `base * 2^(attempt - 1)` plus jitter, capped at [`MAX_BACKOFF`].
    Exponential { base: Duration },
}

/// How many attempts an error class gets and how to wait between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryRule {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Explicit policy table mapping provider error classes to retry behavior,
/// consulted uniformly by the fetcher.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    throttled: RetryRule,
    no_transcript: RetryRule,
    other: RetryRule,
}

impl RetryPolicy {
    /// Policy per the scheduling contract: throttling retries `retry_count`
    /// times with exponential backoff, missing/disabled transcripts never
    /// retry, anything else retries once.
    pub fn new(retry_count: u32, backoff_base: Duration) -> Self {
        Self {
            throttled: RetryRule {
                max_attempts: retry_count + 1,
                backoff: Backoff::Exponential { base: backoff_base },
            },
            no_transcript: RetryRule {
                max_attempts: 1,
                backoff: Backoff::None,
            },
            other: RetryRule {
                max_attempts: 2,
                backoff: Backoff::None,
            },
        }
    }

    pub fn rule_for(&self, error: &TranscriptError) -> RetryRule {
        match error {
            TranscriptError::Throttled(_) => self.throttled,
            TranscriptError::Unavailable(_) | TranscriptError::Disabled(_) => self.no_transcript,
            TranscriptError::Other(_) => self.other,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Delay before the next attempt, with jitter so synchronized workers do not
/// retry in lockstep.
fn backoff_delay(rule: &RetryRule, attempt: u32) -> Duration {
    match rule.backoff {
        Backoff::None => Duration::ZERO,
        Backoff::Exponential { base } => {
            let exp = base.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
            let capped = exp.min(MAX_BACKOFF.as_secs_f64());
            let jitter = capped * JITTER_FACTOR * (rand::thread_rng().gen::<f64>() - 0.5);
            Duration::from_secs_f64((capped + jitter).max(0.0))
        }
    }
}

fn map_exhausted(error: TranscriptError, attempts: u32) -> ExportError {
    match error {
        TranscriptError::Throttled(message) => ExportError::RateLimited { attempts, message },
        TranscriptError::Unavailable(message) | TranscriptError::Disabled(message) => {
            ExportError::NoTranscript(message)
        }
        TranscriptError::Other(message) => ExportError::ProviderError(message),
    }
}

/// Retrieves one video's raw transcript under the shared rate governor.
pub struct Fetcher<P> {
    provider: Arc<P>,
    governor: Arc<RateGovernor>,
    policy: RetryPolicy,
}

impl<P: TranscriptProvider> Fetcher<P> {
    pub fn new(provider: Arc<P>, governor: Arc<RateGovernor>, policy: RetryPolicy) -> Self {
        Self {
            provider,
            governor,
            policy,
        }
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Fetch raw transcript segments for one video.
    ///
    /// Holds a permit for the whole retry loop so a backing-off worker does
    /// not free its slot for another request to the same upstream. The
    /// permit is released on both success and failure when the guard drops.
    pub async fn fetch(&self, video: &VideoRef) -> Result<Vec<RawSegment>, ExportError> {
        let _permit = self.governor.admit().await?;

        let mut attempt = 1u32;
        loop {
            self.governor.pre_request_delay().await;
            debug!("Fetching transcript for {} (attempt {})", video.id, attempt);

            match self.provider.fetch_segments(&video.id).await {
                Ok(segments) => {
                    debug!(
                        "Got {} raw segments for {} after {} attempt(s)",
                        segments.len(),
                        video.id,
                        attempt
                    );
                    return Ok(segments);
                }
                Err(error) => {
                    let rule = self.policy.rule_for(&error);
                    if attempt >= rule.max_attempts {
                        return Err(map_exhausted(error, attempt));
                    }

                    let delay = backoff_delay(&rule, attempt);
                    warn!(
                        "Attempt {}/{} failed for {}: {} (retrying in {:.1}s)",
                        attempt,
                        rule.max_attempts,
                        video.id,
                        error,
                        delay.as_secs_f64()
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn video(id: &str) -> VideoRef {
        VideoRef {
            id: id.to_string(),
            title: format!("Video {}", id),
            url: format!("https://www.youtube.com/watch?v={}", id),
        }
    }

    fn quiet_governor(max_concurrent: usize) -> Arc<RateGovernor> {
        Arc::new(RateGovernor::new(
            max_concurrent,
            Duration::ZERO,
            Duration::ZERO,
        ))
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    /// Provider that plays back a scripted sequence of results.
    struct ScriptedProvider {
        script: Mutex<Vec<Result<Vec<RawSegment>, TranscriptError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Vec<RawSegment>, TranscriptError>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TranscriptProvider for ScriptedProvider {
        async fn fetch_segments(&self, _video_id: &str) -> Result<Vec<RawSegment>, TranscriptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(vec![])
            } else {
                script.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn test_throttled_twice_then_success() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(TranscriptError::Throttled("429".to_string())),
            Err(TranscriptError::Throttled("429".to_string())),
            Ok(vec![json!({"start": 0.0, "text": "hi"})]),
        ]));
        let fetcher = Fetcher::new(provider.clone(), quiet_governor(1), fast_policy());

        let segments = fetcher.fetch(&video("aaaaaaaaaaa")).await.unwrap();
        assert_eq!(segments.len(), 1);
        // Two retries were observed on top of the initial attempt
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_throttling_exhausts_to_rate_limited() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(TranscriptError::Throttled("429".to_string())),
            Err(TranscriptError::Throttled("429".to_string())),
            Err(TranscriptError::Throttled("429".to_string())),
            Err(TranscriptError::Throttled("429".to_string())),
        ]));
        let fetcher = Fetcher::new(provider.clone(), quiet_governor(1), fast_policy());

        let err = fetcher.fetch(&video("aaaaaaaaaaa")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        // retry_count = 3 means 4 attempts total
        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_disabled_fails_immediately_without_retry() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(TranscriptError::Disabled(
            "subtitles disabled".to_string(),
        ))]));
        let fetcher = Fetcher::new(provider.clone(), quiet_governor(1), fast_policy());

        let err = fetcher.fetch(&video("aaaaaaaaaaa")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoTranscript);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_error_retried_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(TranscriptError::Other("connection reset".to_string())),
            Err(TranscriptError::Other("connection reset".to_string())),
        ]));
        let fetcher = Fetcher::new(provider.clone(), quiet_governor(1), fast_policy());

        let err = fetcher.fetch(&video("aaaaaaaaaaa")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    /// Provider that records the peak number of concurrent calls.
    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptProvider for ConcurrencyProbe {
        async fn fetch_segments(&self, _video_id: &str) -> Result<Vec<RawSegment>, TranscriptError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![json!({"start": 0.0, "text": "x"})])
        }
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_cap() {
        let provider = Arc::new(ConcurrencyProbe {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let governor = quiet_governor(3);
        let fetcher = Arc::new(Fetcher::new(provider.clone(), governor, fast_policy()));

        let mut handles = Vec::new();
        for i in 0..10 {
            let fetcher = Arc::clone(&fetcher);
            handles.push(tokio::spawn(async move {
                fetcher.fetch(&video(&format!("video{:06}", i))).await
            }));
        }
        for joined in futures::future::join_all(handles).await {
            assert!(joined.unwrap().is_ok());
        }

        assert!(provider.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_stopped_governor_rejects_new_fetches() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let governor = quiet_governor(1);
        let fetcher = Fetcher::new(provider.clone(), Arc::clone(&governor), fast_policy());

        governor.stop();
        let err = fetcher.fetch(&video("aaaaaaaaaaa")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let rule = RetryRule {
            max_attempts: 4,
            backoff: Backoff::Exponential {
                base: Duration::from_secs(1),
            },
        };
        // Jitter is ±12.5%, so attempt 3 (nominal 4s) always exceeds
        // attempt 1's maximum (1.125s).
        let first = backoff_delay(&rule, 1);
        let third = backoff_delay(&rule, 3);
        assert!(third > first);
        assert!(backoff_delay(&rule, 20) <= Duration::from_secs_f64(30.0 * 1.125));
    }
}
