//! Transcoder: duration probing and H.264/AAC re-encoding through ffprobe/ffmpeg

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;

use crate::core::config;
use crate::core::process::{self, run_with_timeout, ProcessError};

/// Duration probe failure. The planner maps every variant to "duration unavailable".
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to run probe: {0}")]
    Spawn(String),

    #[error("Probe timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Probe exited with an error: {stderr}")]
    NonZeroExit { stderr: String },

    #[error("Probe output is not valid JSON: {0}")]
    Malformed(String),

    #[error("Probe output has no usable duration")]
    MissingDuration,
}

impl From<ProcessError> for ProbeError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Timeout { timeout, .. } => Self::Timeout(timeout),
            other => Self::Spawn(other.to_string()),
        }
    }
}

/// Result of one encode invocation. The output file is only trusted when `succeeded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOutcome {
    pub succeeded: bool,
    pub stderr_text: String,
}

impl ExitOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            stderr_text: String::new(),
        }
    }

    pub fn failure(stderr_text: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stderr_text: stderr_text.into(),
        }
    }
}

/// Parameters of a single encode
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionAttempt {
    pub input_path: PathBuf,
    pub target_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub preset: &'static str,
    pub crf: Option<u8>,
    /// ffmpeg `-vf` expression
    pub video_filter: Option<&'static str>,
    pub output_path: PathBuf,
}

/// External decode/encode tool chain.
///
/// Both calls block on an external process and must run on the worker pool.
pub trait Transcoder: Send + Sync {
    /// Duration of the media at `path`, in seconds
    fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError>;

    /// Encode `attempt.input_path` into `attempt.output_path`, overwriting it
    fn encode(&self, attempt: &CompressionAttempt) -> ExitOutcome;
}

/// ffmpeg arguments for an attempt
pub fn encode_args(attempt: &CompressionAttempt) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into(), "-y".into()];
    args.push("-i".into());
    args.push(attempt.input_path.clone().into_os_string());
    args.extend(
        [
            "-c:v".to_string(),
            "libx264".to_string(),
            "-b:v".to_string(),
            format!("{}k", attempt.target_bitrate_kbps),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", attempt.audio_bitrate_kbps),
            "-preset".to_string(),
            attempt.preset.to_string(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    if let Some(crf) = attempt.crf {
        args.push("-crf".into());
        args.push(crf.to_string().into());
    }
    if let Some(filter) = attempt.video_filter {
        args.push("-vf".into());
        args.push(filter.into());
    }
    args.push("-movflags".into());
    args.push("+faststart".into());
    args.push(attempt.output_path.clone().into_os_string());
    args
}

#[derive(Deserialize)]
struct FfprobeReport {
    format: Option<FfprobeFormat>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    /// ffprobe prints numbers in `format` as strings
    duration: Option<String>,
}

/// Extract `format.duration` from `ffprobe -print_format json -show_format` output
pub fn parse_ffprobe_duration(json: &str) -> Result<f64, ProbeError> {
    let report: FfprobeReport = serde_json::from_str(json).map_err(|e| ProbeError::Malformed(e.to_string()))?;
    let duration = report
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .ok_or(ProbeError::MissingDuration)?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(ProbeError::MissingDuration);
    }
    Ok(duration)
}

/// ffmpeg + ffprobe invoked as external processes
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    probe_timeout: Duration,
    encode_timeout: Duration,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            ffmpeg_bin: config::FFMPEG_BIN.clone(),
            ffprobe_bin: config::FFPROBE_BIN.clone(),
            probe_timeout: config::transcode::probe_timeout(),
            encode_timeout: config::transcode::encode_timeout(),
        }
    }
}

impl Ffmpeg {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
            ..Self::default()
        }
    }

    pub fn with_timeouts(mut self, probe: Duration, encode: Duration) -> Self {
        self.probe_timeout = probe;
        self.encode_timeout = encode;
        self
    }

    /// Whether both ffmpeg and ffprobe can be started
    pub fn check_available(&self) -> bool {
        let ffmpeg = process::tool_available(&self.ffmpeg_bin, "-version");
        let ffprobe = process::tool_available(&self.ffprobe_bin, "-version");
        ffmpeg && ffprobe
    }
}

impl Transcoder for Ffmpeg {
    fn probe_duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let mut cmd = Command::new(&self.ffprobe_bin);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path);

        let output = run_with_timeout(&mut cmd, self.probe_timeout)?;
        if !output.success() {
            log::warn!("ffprobe failed for {}: {}", path.display(), output.stderr_excerpt());
            return Err(ProbeError::NonZeroExit {
                stderr: output.stderr_excerpt().to_string(),
            });
        }

        let duration = parse_ffprobe_duration(&output.stdout)?;
        log::debug!("Probed duration of {}: {:.2}s", path.display(), duration);
        Ok(duration)
    }

    fn encode(&self, attempt: &CompressionAttempt) -> ExitOutcome {
        let mut cmd = Command::new(&self.ffmpeg_bin);
        cmd.args(encode_args(attempt));

        log::info!(
            "Encoding {} -> {} at {}k video / {}k audio, preset {}",
            attempt.input_path.display(),
            attempt.output_path.display(),
            attempt.target_bitrate_kbps,
            attempt.audio_bitrate_kbps,
            attempt.preset
        );

        match run_with_timeout(&mut cmd, self.encode_timeout) {
            Ok(output) if output.success() => ExitOutcome::success(),
            Ok(output) => {
                log::error!("ffmpeg exited with {}: {}", output.status, output.stderr_excerpt());
                ExitOutcome::failure(output.stderr)
            }
            Err(e) => {
                log::error!("ffmpeg did not complete: {}", e);
                ExitOutcome::failure(e.to_string())
            }
        }
    }
}
