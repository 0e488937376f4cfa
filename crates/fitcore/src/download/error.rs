use std::path::PathBuf;

use crate::core::process::{excerpt, ProcessError};
use crate::core::WorkerError;

use super::compression::{RejectReason, Rejection, Stage};
use super::ytdlp_errors::ExtractionFailure;

/// Failure reported by an [`super::extractor::ExtractionEngine`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct EngineError {
    pub kind: ExtractionFailure,
    pub detail: String,
}

impl EngineError {
    pub fn new(kind: ExtractionFailure, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl From<ProcessError> for EngineError {
    fn from(err: ProcessError) -> Self {
        let kind = match &err {
            ProcessError::Spawn { .. } => ExtractionFailure::ToolMissing,
            ProcessError::Timeout { .. } => ExtractionFailure::Timeout,
            ProcessError::Wait { .. } => ExtractionFailure::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// What the user should be told to do about a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    TryDifferentVideo,
    TryAgainLater,
    PlatformUnsupported,
}

/// Terminal failure of a pipeline request.
///
/// Every process and filesystem failure is converted into one of these at the
/// component boundary. None of them affects other requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// Unsupported URL, private content, or engine failure while resolving
    #[error("Extraction failed ({kind}): {detail}")]
    Extraction { kind: ExtractionFailure, detail: String },

    #[error("No downloadable video format")]
    NoDownloadableFormat,

    /// Transfer exhausted its retries or exceeded the maximum source size
    #[error("Download failed ({kind}): {detail}")]
    DownloadTransfer { kind: ExtractionFailure, detail: String },

    #[error("Downloaded file not found near {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Could not determine video duration: {0}")]
    Probe(String),

    #[error("Encoding failed at {stage}: {stderr}")]
    Encode { stage: Stage, stderr: String },

    /// Compression could not bring the file under the ceiling
    #[error("Could not fit under the size limit at {stage}: {reason}")]
    SizeBudgetExceeded { stage: Stage, reason: RejectReason },

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Stable snake-case reason, suitable for logs and metrics labels
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Extraction { kind, .. } => match kind {
                ExtractionFailure::UnsupportedUrl => "unsupported_url",
                ExtractionFailure::Unavailable => "video_unavailable",
                _ => "extraction_failed",
            },
            Self::NoDownloadableFormat => "no_downloadable_format",
            Self::DownloadTransfer { kind, .. } => match kind {
                ExtractionFailure::TooLarge => "source_too_large",
                ExtractionFailure::Timeout => "download_timeout",
                _ => "download_failed",
            },
            Self::FileNotFound(_) => "file_not_found",
            Self::Probe(_) => "duration_unavailable",
            Self::Encode { .. } => "encode_failed",
            Self::SizeBudgetExceeded { reason, .. } => reason.as_str(),
            Self::Cancelled => "cancelled",
            Self::Worker(_) => "worker_failed",
        }
    }

    pub fn advice(&self) -> Advice {
        match self {
            Self::Extraction { kind, .. } => match kind {
                ExtractionFailure::UnsupportedUrl => Advice::PlatformUnsupported,
                ExtractionFailure::Network | ExtractionFailure::Timeout | ExtractionFailure::ToolMissing => {
                    Advice::TryAgainLater
                }
                _ => Advice::TryDifferentVideo,
            },
            Self::DownloadTransfer { kind, .. } => match kind {
                ExtractionFailure::TooLarge | ExtractionFailure::Unavailable => Advice::TryDifferentVideo,
                ExtractionFailure::UnsupportedUrl => Advice::PlatformUnsupported,
                _ => Advice::TryAgainLater,
            },
            Self::NoDownloadableFormat | Self::Probe(_) | Self::SizeBudgetExceeded { .. } => Advice::TryDifferentVideo,
            Self::FileNotFound(_) | Self::Encode { .. } | Self::Cancelled | Self::Worker(_) => Advice::TryAgainLater,
        }
    }

    /// Engine failure while resolving metadata
    pub fn extraction(err: EngineError) -> Self {
        Self::Extraction {
            kind: err.kind,
            detail: err.detail,
        }
    }

    /// Engine failure while downloading. Content problems stay extraction errors.
    pub fn transfer(err: EngineError) -> Self {
        match err.kind {
            ExtractionFailure::UnsupportedUrl | ExtractionFailure::Unavailable => Self::extraction(err),
            kind => Self::DownloadTransfer {
                kind,
                detail: err.detail,
            },
        }
    }
}

impl From<Rejection> for PipelineError {
    fn from(rejection: Rejection) -> Self {
        let stage = rejection.stage.unwrap_or(Stage::One);
        match rejection.reason {
            RejectReason::DurationUnavailable(detail) => Self::Probe(detail),
            RejectReason::EncodeFailed { stderr } => Self::Encode {
                stage,
                stderr: excerpt(&stderr, 500).to_string(),
            },
            reason @ (RejectReason::BitrateFloor { .. } | RejectReason::StillTooLarge { .. }) => {
                Self::SizeBudgetExceeded { stage, reason }
            }
            RejectReason::Cancelled => Self::Cancelled,
            RejectReason::Worker(detail) => Self::Worker(detail),
        }
    }
}

impl From<WorkerError> for PipelineError {
    fn from(err: WorkerError) -> Self {
        Self::Worker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reason_strings() {
        assert_eq!(PipelineError::FileNotFound(PathBuf::from("/w/source")).reason(), "file_not_found");
        assert_eq!(PipelineError::NoDownloadableFormat.reason(), "no_downloadable_format");
        assert_eq!(PipelineError::Probe("x".into()).reason(), "duration_unavailable");
        assert_eq!(
            PipelineError::Extraction {
                kind: ExtractionFailure::UnsupportedUrl,
                detail: String::new()
            }
            .reason(),
            "unsupported_url"
        );
    }

    #[test]
    fn test_rejection_mapping() {
        let floor = PipelineError::from(Rejection::new(
            RejectReason::BitrateFloor {
                target_kbps: 80,
                floor_kbps: 100,
            },
            Some(Stage::One),
        ));
        assert_eq!(floor.reason(), "bitrate_floor");
        assert!(matches!(floor, PipelineError::SizeBudgetExceeded { stage: Stage::One, .. }));

        let too_large = PipelineError::from(Rejection::new(
            RejectReason::StillTooLarge { size_bytes: 1 },
            Some(Stage::Two),
        ));
        assert_eq!(too_large.reason(), "still_too_large");

        let encode = PipelineError::from(Rejection::new(
            RejectReason::EncodeFailed { stderr: "x".repeat(2000) },
            Some(Stage::Two),
        ));
        assert_eq!(encode.reason(), "encode_failed");
        assert!(matches!(&encode, PipelineError::Encode { stage: Stage::Two, stderr } if stderr.len() == 500));

        let probe = PipelineError::from(Rejection::new(RejectReason::DurationUnavailable("n/a".into()), None));
        assert_eq!(probe, PipelineError::Probe("n/a".into()));
    }

    #[test]
    fn test_advice_distinguishes_outcomes() {
        let unsupported = PipelineError::extraction(EngineError::new(ExtractionFailure::UnsupportedUrl, ""));
        assert_eq!(unsupported.advice(), Advice::PlatformUnsupported);

        let private = PipelineError::extraction(EngineError::new(ExtractionFailure::Unavailable, ""));
        assert_eq!(private.advice(), Advice::TryDifferentVideo);

        let network = PipelineError::transfer(EngineError::new(ExtractionFailure::Network, ""));
        assert_eq!(network.advice(), Advice::TryAgainLater);
        assert_eq!(network.reason(), "download_failed");

        let too_big = PipelineError::transfer(EngineError::new(ExtractionFailure::TooLarge, ""));
        assert_eq!(too_big.advice(), Advice::TryDifferentVideo);
        assert_eq!(too_big.reason(), "source_too_large");
    }

    #[test]
    fn test_transfer_keeps_content_errors_as_extraction() {
        let err = PipelineError::transfer(EngineError::new(ExtractionFailure::Unavailable, "private"));
        assert!(matches!(err, PipelineError::Extraction { .. }));
    }

    #[test]
    fn test_engine_error_from_process() {
        let err = EngineError::from(ProcessError::Timeout {
            program: "yt-dlp".into(),
            timeout: std::time::Duration::from_secs(120),
        });
        assert_eq!(err.kind, ExtractionFailure::Timeout);
    }
}
