//! In-process stand-ins for the extraction engine and the transcoder
//!
//! Nothing here starts an external process. Files are created sparse with
//! `set_len`, so "60 MB downloads" cost nothing.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fitcore::download::transcoder::{CompressionAttempt, ExitOutcome, ProbeError, Transcoder};
use fitcore::download::{EngineError, ExtractionEngine, FormatSelector, MediaFormat, VideoInfo};

pub fn format(id: &str, height: Option<u32>) -> MediaFormat {
    MediaFormat {
        format_id: id.to_string(),
        height,
        ext: "mp4".to_string(),
        codec_video: Some("avc1".to_string()),
        codec_audio: Some("mp4a".to_string()),
        url: Some(format!("https://cdn.example.com/{}", id)),
        ..Default::default()
    }
}

pub fn video(formats: Vec<MediaFormat>) -> VideoInfo {
    VideoInfo {
        title: "Test Video".to_string(),
        duration_seconds: Some(120.0),
        uploader: Some("tester".to_string()),
        formats,
        playlist: None,
    }
}

fn write_sparse(path: &Path, size: u64) {
    let file = std::fs::File::create(path).unwrap();
    file.set_len(size).unwrap();
}

/// What the mock engine does on `download`
#[derive(Debug, Clone)]
pub enum DownloadBehavior {
    /// Write `source.<ext>` of `size` bytes; report the path when `report` is set
    Write { ext: &'static str, size: u64, report: bool },
    Fail(EngineError),
    /// Succeed without producing a file
    Nothing,
}

pub struct MockEngine {
    info: Result<VideoInfo, EngineError>,
    behavior: DownloadBehavior,
    downloads: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn new(info: Result<VideoInfo, EngineError>, behavior: DownloadBehavior) -> Self {
        Self {
            info,
            behavior,
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn downloading(ext: &'static str, size: u64) -> Self {
        Self::new(
            Ok(video(vec![format("18", Some(360))])),
            DownloadBehavior::Write { ext, size, report: true },
        )
    }

    /// Selectors passed to `download`, in call order
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

impl ExtractionEngine for MockEngine {
    fn resolve_info(&self, _url: &str) -> Result<VideoInfo, EngineError> {
        self.info.clone()
    }

    fn download(
        &self,
        _url: &str,
        selector: &FormatSelector,
        output_template: &Path,
    ) -> Result<Option<PathBuf>, EngineError> {
        self.downloads.lock().unwrap().push(selector.as_arg().to_string());
        let dir = output_template.parent().unwrap();
        match &self.behavior {
            DownloadBehavior::Write { ext, size, report } => {
                let path = dir.join(format!("source.{}", ext));
                write_sparse(&path, *size);
                Ok(report.then_some(path))
            }
            DownloadBehavior::Fail(err) => Err(err.clone()),
            DownloadBehavior::Nothing => Ok(None),
        }
    }
}

/// Produces an output of the configured size per encode; `None` fails it
pub struct MockTranscoder {
    duration: Option<f64>,
    outputs: Vec<Option<u64>>,
    attempts: Mutex<Vec<CompressionAttempt>>,
}

impl MockTranscoder {
    pub fn new(duration: Option<f64>, outputs: Vec<Option<u64>>) -> Self {
        Self {
            duration,
            outputs,
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Transcoder that must never be used
    pub fn unused() -> Self {
        Self::new(None, Vec::new())
    }

    pub fn attempts(&self) -> Vec<CompressionAttempt> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Transcoder for MockTranscoder {
    fn probe_duration(&self, _path: &Path) -> Result<f64, ProbeError> {
        self.duration.ok_or(ProbeError::MissingDuration)
    }

    fn encode(&self, attempt: &CompressionAttempt) -> ExitOutcome {
        let mut attempts = self.attempts.lock().unwrap();
        let index = attempts.len();
        attempts.push(attempt.clone());
        match self.outputs.get(index).copied().flatten() {
            Some(size) => {
                write_sparse(&attempt.output_path, size);
                ExitOutcome::success()
            }
            None => ExitOutcome::failure("Error while opening encoder"),
        }
    }
}
