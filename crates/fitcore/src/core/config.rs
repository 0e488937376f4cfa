use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration constants for the bot
/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// ffmpeg binary used for re-encoding
/// Read from FFMPEG_BIN environment variable, defaults to "ffmpeg"
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// ffprobe binary used for duration probing
/// Read from FFPROBE_BIN environment variable, defaults to "ffprobe"
pub static FFPROBE_BIN: Lazy<String> =
    Lazy::new(|| env::var("FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string()));

/// Root directory for per-request working directories
/// Read from TEMP_FILES_DIR environment variable
/// Defaults to the system temp directory
pub static TEMP_FILES_DIR: Lazy<PathBuf> = Lazy::new(|| {
    env::var("TEMP_FILES_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir())
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: fitbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "fitbot.log".to_string()));

/// Log level name (error, warn, info, debug, trace)
/// Read from LOG_LEVEL environment variable
/// Default: info
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Bot token
/// First non-empty of BOT_TOKEN, TELEGRAM_BOT_TOKEN, TELE_TOKEN, TELOXIDE_TOKEN
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    ["BOT_TOKEN", "TELEGRAM_BOT_TOKEN", "TELE_TOKEN", "TELOXIDE_TOKEN"]
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_default()
});

/// Size limits
pub mod limits {
    /// Maximum size of a file the bot may upload (Telegram bot API limit)
    pub const MAX_DELIVERY_SIZE_BYTES: u64 = 50 * 1024 * 1024;

    /// Maximum source size the extraction engine is allowed to fetch
    pub const MAX_SOURCE_SIZE_BYTES: u64 = 500 * 1024 * 1024;
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// Retries for transient network failures
    pub const RETRIES: u32 = 3;

    /// Retries per fragment for chunked transfers
    pub const FRAGMENT_RETRIES: u32 = 3;

    /// Chunk size for chunked HTTP transfers (bytes)
    pub const HTTP_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

    /// Timeout for metadata extraction (in seconds)
    pub const METADATA_TIMEOUT_SECS: u64 = 120;

    /// Timeout for the whole download + container normalization (in seconds)
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 30 * 60;

    pub fn metadata_timeout() -> Duration {
        Duration::from_secs(METADATA_TIMEOUT_SECS)
    }

    pub fn download_timeout() -> Duration {
        Duration::from_secs(DOWNLOAD_TIMEOUT_SECS)
    }
}

/// Transcoding configuration
pub mod transcode {
    use super::Duration;

    /// Timeout for ffprobe duration queries (in seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 30;

    /// Timeout for a single ffmpeg encode (in seconds)
    pub const ENCODE_TIMEOUT_SECS: u64 = 30 * 60;

    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }

    pub fn encode_timeout() -> Duration {
        Duration::from_secs(ENCODE_TIMEOUT_SECS)
    }
}

/// Worker pool configuration
pub mod workers {
    use once_cell::sync::Lazy;

    /// Default number of blocking jobs (extraction, probe, encode) allowed at once
    pub const DEFAULT_POOL_SIZE: usize = 4;

    /// Read from WORKER_POOL_SIZE, falls back to DEFAULT_POOL_SIZE on missing or invalid values
    pub static POOL_SIZE: Lazy<usize> = Lazy::new(|| {
        std::env::var("WORKER_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_POOL_SIZE)
    });
}

/// Format selection presented to the user
pub mod selection {
    /// Maximum number of concrete formats offered in the quality keyboard
    pub const MAX_PRESENTED_FORMATS: usize = 5;

    /// Minimum height for a format to count as "good"
    pub const GOOD_FORMAT_MIN_HEIGHT: u32 = 360;

    /// Formats below this height are dropped entirely
    pub const MIN_FORMAT_HEIGHT: u32 = 144;
}

/// Per-request working directories under TEMP_FILES_DIR
pub mod workdir {
    /// Prefix of directories created by the bot; swept at startup and shutdown
    pub const BOT_PREFIX: &str = "fitbot-req-";

    /// Prefix of directories created by the `download` subcommand
    pub const CLI_PREFIX: &str = "fitbot-cli-";
}

/// Pending request (quality selection) configuration
pub mod session {
    use super::Duration;

    /// How long a pending quality selection stays valid (in seconds)
    pub const REQUEST_TTL_SECS: u64 = 30 * 60;

    /// Upper bound on pending selections kept in memory
    pub const MAX_PENDING_REQUESTS: u64 = 10_000;

    pub fn request_ttl() -> Duration {
        Duration::from_secs(REQUEST_TTL_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Telegram API requests (in seconds)
    /// Large so that 50 MB uploads do not time out on slow links
    pub const REQUEST_TIMEOUT_SECS: u64 = 900;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
