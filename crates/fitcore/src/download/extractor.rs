//! Extraction engine: URL to metadata and URL to local file, via the yt-dlp CLI

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;

use crate::core::config;
use crate::core::process::{self, run_with_timeout};

use super::error::EngineError;
use super::models::{FormatSelector, MediaFormat, PlaylistOrigin, VideoInfo};
use super::ytdlp_errors::{classify_stderr, ExtractionFailure};

/// External URL-to-media engine.
///
/// Both calls block on an external process and must run on the worker pool.
pub trait ExtractionEngine: Send + Sync {
    /// Read-only metadata query
    fn resolve_info(&self, url: &str) -> Result<VideoInfo, EngineError>;

    /// Fetch `selector` for `url` into `output_template` (an engine output
    /// template such as `/dir/source.%(ext)s`).
    ///
    /// Returns the final path when the engine reports it.
    fn download(
        &self,
        url: &str,
        selector: &FormatSelector,
        output_template: &Path,
    ) -> Result<Option<PathBuf>, EngineError>;
}

#[derive(Deserialize)]
struct RawInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    formats: Option<Vec<MediaFormat>>,
    /// Unavailable playlist entries come back as `null`
    entries: Option<Vec<Option<RawInfo>>>,
    playlist_count: Option<u64>,
}

/// Build [`VideoInfo`] from `yt-dlp -J` output.
///
/// For a playlist the first entry is returned and the playlist is recorded in
/// [`VideoInfo::playlist`].
pub fn parse_info(json: &str) -> Result<VideoInfo, EngineError> {
    let raw: RawInfo =
        serde_json::from_str(json).map_err(|e| EngineError::new(ExtractionFailure::Malformed, e.to_string()))?;

    let is_playlist = raw.kind.as_deref() == Some("playlist") || raw.entries.is_some();
    if !is_playlist {
        return Ok(video_info(raw, None));
    }

    let entries = raw.entries.unwrap_or_default();
    let entry_count = raw.playlist_count.or(Some(entries.len() as u64));
    let origin = PlaylistOrigin {
        title: raw.title,
        entry_count,
    };
    let first = entries
        .into_iter()
        .flatten()
        .next()
        .ok_or_else(|| EngineError::new(ExtractionFailure::Unavailable, "Playlist has no available entries"))?;

    log::info!(
        "Playlist {:?} ({:?} entries): taking the first entry only",
        origin.title,
        origin.entry_count
    );
    Ok(video_info(first, Some(origin)))
}

fn video_info(raw: RawInfo, playlist: Option<PlaylistOrigin>) -> VideoInfo {
    VideoInfo {
        title: raw.title.unwrap_or_else(|| "Unknown".to_string()),
        duration_seconds: raw.duration.filter(|d| d.is_finite() && *d > 0.0),
        uploader: raw.uploader,
        formats: raw.formats.unwrap_or_default(),
        playlist,
    }
}

/// The engine prints the final path as the last stdout line
pub fn reported_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(PathBuf::from)
}

/// yt-dlp command line
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    bin: String,
    metadata_timeout: Duration,
    download_timeout: Duration,
    max_source_size: u64,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self {
            bin: config::YTDL_BIN.clone(),
            metadata_timeout: config::download::metadata_timeout(),
            download_timeout: config::download::download_timeout(),
            max_source_size: config::limits::MAX_SOURCE_SIZE_BYTES,
        }
    }
}

impl YtDlpEngine {
    pub fn new(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            ..Self::default()
        }
    }

    pub fn with_max_source_size(mut self, bytes: u64) -> Self {
        self.max_source_size = bytes;
        self
    }

    pub fn check_available(&self) -> bool {
        process::tool_available(&self.bin, "--version")
    }

    pub fn info_args(url: &str) -> Vec<String> {
        vec![
            "-J".to_string(),
            "--no-warnings".to_string(),
            "--playlist-items".to_string(),
            "1".to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }

    pub fn download_args(&self, url: &str, selector: &FormatSelector, output_template: &Path) -> Vec<String> {
        vec![
            "-f".to_string(),
            selector.as_arg().to_string(),
            "-o".to_string(),
            output_template.to_string_lossy().into_owned(),
            "--retries".to_string(),
            config::download::RETRIES.to_string(),
            "--fragment-retries".to_string(),
            config::download::FRAGMENT_RETRIES.to_string(),
            "--http-chunk-size".to_string(),
            config::download::HTTP_CHUNK_SIZE.to_string(),
            "--max-filesize".to_string(),
            self.max_source_size.to_string(),
            "--recode-video".to_string(),
            "mp4".to_string(),
            "--playlist-items".to_string(),
            "1".to_string(),
            "--no-warnings".to_string(),
            "--no-progress".to_string(),
            "--no-simulate".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }

    fn failure(output: &process::ProcessOutput) -> EngineError {
        let kind = classify_stderr(&output.stderr);
        log::error!("yt-dlp failed ({}): {}", kind, output.stderr_excerpt());
        EngineError::new(kind, output.stderr_excerpt().trim())
    }
}

impl ExtractionEngine for YtDlpEngine {
    fn resolve_info(&self, url: &str) -> Result<VideoInfo, EngineError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(Self::info_args(url));

        let output = run_with_timeout(&mut cmd, self.metadata_timeout)?;
        if !output.success() {
            return Err(Self::failure(&output));
        }

        let info = parse_info(&output.stdout)?;
        log::info!("Resolved {}: {:?} with {} formats", url, info.title, info.formats.len());
        Ok(info)
    }

    fn download(
        &self,
        url: &str,
        selector: &FormatSelector,
        output_template: &Path,
    ) -> Result<Option<PathBuf>, EngineError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(self.download_args(url, selector, output_template));

        let output = run_with_timeout(&mut cmd, self.download_timeout)?;
        if !output.success() {
            return Err(Self::failure(&output));
        }

        let path = reported_path(&output.stdout);
        // yt-dlp skips oversized files with a zero exit status
        if path.is_none() && classify_stderr(&output.stderr) == ExtractionFailure::TooLarge {
            return Err(EngineError::new(ExtractionFailure::TooLarge, output.stderr_excerpt().trim()));
        }
        Ok(path)
    }
}
