//! Classification of yt-dlp stderr
//!
//! yt-dlp reports every failure as free text on stderr with a non-zero exit.
//! The kind decides what the user is told to do next.

use std::fmt;

/// Kind of extraction-engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// No extractor for this site, or not a media page
    UnsupportedUrl,
    /// Private, removed, geo-blocked or login-only content
    Unavailable,
    /// Transfer failed after retries
    Network,
    /// Source is larger than the accepted maximum
    TooLarge,
    /// The engine process exceeded its time budget
    Timeout,
    /// The engine binary could not be started
    ToolMissing,
    /// The engine's output could not be parsed
    Malformed,
    Other,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnsupportedUrl => "unsupported URL",
            Self::Unavailable => "video unavailable",
            Self::Network => "network error",
            Self::TooLarge => "source too large",
            Self::Timeout => "timed out",
            Self::ToolMissing => "extraction tool missing",
            Self::Malformed => "malformed engine output",
            Self::Other => "extraction failed",
        };
        f.write_str(text)
    }
}

/// Analyze yt-dlp stderr and determine the failure kind
pub fn classify_stderr(stderr: &str) -> ExtractionFailure {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("unsupported url")
        || stderr_lower.contains("is not a valid url")
        || stderr_lower.contains("no video formats found")
        || stderr_lower.contains("no suitable extractor")
    {
        return ExtractionFailure::UnsupportedUrl;
    }

    // yt-dlp aborts with this wording when --max-filesize is exceeded
    if stderr_lower.contains("larger than max-filesize") || stderr_lower.contains("file is larger than") {
        return ExtractionFailure::TooLarge;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("has been removed")
        || stderr_lower.contains("does not exist")
        || stderr_lower.contains("not available in your country")
        || stderr_lower.contains("sign in to confirm")
        || stderr_lower.contains("login required")
        || stderr_lower.contains("http error 404")
        || stderr_lower.contains("http error 403")
    {
        return ExtractionFailure::Unavailable;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("socket")
        || stderr_lower.contains("dns")
        || stderr_lower.contains("failed to connect")
        || stderr_lower.contains("http error 5")
    {
        return ExtractionFailure::Network;
    }

    ExtractionFailure::Other
}
