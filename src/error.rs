use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the export pipeline.
///
/// Per-video kinds (`RateLimited`, `NoTranscript`, `ProviderError`,
/// `MalformedSegment`, `WriteFailed`, `Cancelled`) are captured in a
/// [`FetchOutcome`](crate::pipeline::FetchOutcome) and never abort the batch.
/// `InvalidUrl` and `EnumerationFailed` on the root input abort the run.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unrecognized YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("enumeration failed: {0}")]
    EnumerationFailed(String),

    #[error("rate limited after {attempts} attempts: {message}")]
    RateLimited { attempts: u32, message: String },

    #[error("no transcript available: {0}")]
    NoTranscript(String),

    #[error("transcript provider error: {0}")]
    ProviderError(String),

    #[error("malformed transcript segment: {0}")]
    MalformedSegment(String),

    #[error("failed to write document: {0}")]
    WriteFailed(String),

    #[error("cancelled before fetch started")]
    Cancelled,
}

/// Coarse error classification used for summary grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidUrl,
    EnumerationFailed,
    RateLimited,
    NoTranscript,
    ProviderError,
    MalformedSegment,
    WriteFailed,
    Cancelled,
}

impl ExportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::EnumerationFailed(_) => ErrorKind::EnumerationFailed,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::NoTranscript(_) => ErrorKind::NoTranscript,
            Self::ProviderError(_) => ErrorKind::ProviderError,
            Self::MalformedSegment(_) => ErrorKind::MalformedSegment,
            Self::WriteFailed(_) => ErrorKind::WriteFailed,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether this error aborts the whole run rather than a single video.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::EnumerationFailed(_))
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::InvalidUrl => "invalid-url",
            Self::EnumerationFailed => "enumeration-failed",
            Self::RateLimited => "rate-limited",
            Self::NoTranscript => "no-transcript",
            Self::ProviderError => "provider-error",
            Self::MalformedSegment => "malformed-segment",
            Self::WriteFailed => "write-failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}
