//! Data types shared by the catalog, the pipeline and its callers

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::compression::Stage;

/// yt-dlp reports missing strings as `null` as often as it omits them
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Some extractors report sizes and heights as floats
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
    }))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u64(deserializer)?.and_then(|v| u32::try_from(v).ok()))
}

/// One encoding variant of a source video, as reported by the extraction engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaFormat {
    #[serde(default, deserialize_with = "null_as_default")]
    pub format_id: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ext: String,
    /// `"none"` for audio-only variants; absent means the engine did not say
    #[serde(default, rename = "vcodec")]
    pub codec_video: Option<String>,
    #[serde(default, rename = "acodec")]
    pub codec_audio: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub filesize_approx: Option<u64>,
    #[serde(default, rename = "format_note", deserialize_with = "null_as_default")]
    pub note: String,
}

impl MediaFormat {
    pub fn is_audio_only(&self) -> bool {
        self.codec_video.as_deref() == Some("none")
    }

    /// Exact size when known, otherwise the engine's estimate
    pub fn size_hint(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx).filter(|size| *size > 0)
    }
}

/// Set when the URL pointed at a playlist and only its first entry was taken
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistOrigin {
    pub title: Option<String>,
    pub entry_count: Option<u64>,
}

/// Metadata for a single video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration_seconds: Option<f64>,
    pub uploader: Option<String>,
    pub formats: Vec<MediaFormat>,
    pub playlist: Option<PlaylistOrigin>,
}

/// Which source format the engine should fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FormatSelector {
    /// Let the engine pick its best single-file variant
    #[default]
    Best,
    Id(String),
}

impl FormatSelector {
    /// Parse a user- or CLI-supplied selector; `"best"` and empty both mean [`FormatSelector::Best`]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("best") {
            Self::Best
        } else {
            Self::Id(value.to_string())
        }
    }

    /// Value passed to the engine's format option
    pub fn as_arg(&self) -> &str {
        match self {
            Self::Best => "best",
            Self::Id(id) => id,
        }
    }
}

impl std::fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Progress notifications emitted while a request runs
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Downloading,
    Compressing { size_bytes: u64, ceiling_bytes: u64 },
    EncodingStage { stage: Stage, target_bitrate_kbps: u32 },
    Ready { size_bytes: u64 },
}

/// Input to [`super::DownloadPipeline::run`]. One per user action.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub selector: FormatSelector,
    /// Per-request working directory. Must not be shared with other requests.
    pub destination_dir: PathBuf,
    pub progress: Option<mpsc::UnboundedSender<PipelineEvent>>,
    pub cancel: CancellationToken,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, selector: FormatSelector, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            selector,
            destination_dir: destination_dir.into(),
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send a progress event; a dropped receiver is not an error
    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(event);
        }
    }
}

/// A ready-to-send file. The caller owns it from here on.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Whether the file went through the compression planner
    pub compressed: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_media_format_from_ytdlp_json() {
        let json = r#"{
            "format_id": "22",
            "height": 720,
            "ext": "mp4",
            "vcodec": "avc1.64001F",
            "acodec": "mp4a.40.2",
            "url": "https://cdn.example.com/v.mp4",
            "filesize": null,
            "filesize_approx": 1048576.7,
            "format_note": null
        }"#;
        let format: MediaFormat = serde_json::from_str(json).unwrap();
        assert_eq!(format.format_id, "22");
        assert_eq!(format.height, Some(720));
        assert_eq!(format.note, "");
        assert_eq!(format.size_hint(), Some(1_048_576));
        assert!(!format.is_audio_only());
    }

    #[test]
    fn test_audio_only_detection() {
        let format = MediaFormat {
            codec_video: Some("none".to_string()),
            ..Default::default()
        };
        assert!(format.is_audio_only());
        assert!(!MediaFormat::default().is_audio_only());
    }

    #[test]
    fn test_format_selector_parse() {
        assert_eq!(FormatSelector::parse("best"), FormatSelector::Best);
        assert_eq!(FormatSelector::parse(" BEST "), FormatSelector::Best);
        assert_eq!(FormatSelector::parse(""), FormatSelector::Best);
        assert_eq!(FormatSelector::parse("137"), FormatSelector::Id("137".to_string()));
        assert_eq!(FormatSelector::Id("137".to_string()).as_arg(), "137");
        assert_eq!(FormatSelector::Best.to_string(), "best");
    }

    #[test]
    fn test_emit_without_receiver_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let request = DownloadRequest::new("https://example.com", FormatSelector::Best, "/tmp").with_progress(tx);
        request.emit(PipelineEvent::Downloading);
    }
}
