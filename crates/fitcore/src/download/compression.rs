//! Compression planner
//!
//! Fits an oversized file under a size ceiling with a fixed two-stage
//! escalation. Each stage has its own bitrate headroom, bitrate floor and
//! encoder settings:
//!
//! ```text
//! START -> STAGE1 encode -> check -> ACCEPTED
//!                                 -> STAGE2 encode -> check -> ACCEPTED | REJECTED
//! ```
//!
//! The decision after each encode is made by [`transition`], a pure function,
//! so every terminal condition can be tested without running an encoder.
//! Rejected outputs are deleted before the next stage or before returning,
//! so at most the accepted file is left on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::utils::format_file_size;
use crate::core::WorkerPool;

use super::models::PipelineEvent;
use super::transcoder::{CompressionAttempt, ExitOutcome, Transcoder};

/// Forces both output dimensions to even numbers, which libx264 requires
pub const EVEN_DIMENSIONS_FILTER: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// Escalation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    One,
    Two,
}

/// Encoder settings and bitrate budget for one stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagePolicy {
    /// Share of the ceiling the video stream may use
    pub headroom: f64,
    /// Targets below this are rejected without encoding
    pub min_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub preset: &'static str,
    pub crf: Option<u8>,
    pub video_filter: Option<&'static str>,
    /// Appended to the input's file stem
    pub output_suffix: &'static str,
}

impl Stage {
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    /// Next, more aggressive stage. There is nothing after stage two.
    pub fn next(self) -> Option<Stage> {
        match self {
            Self::One => Some(Self::Two),
            Self::Two => None,
        }
    }

    pub fn policy(self) -> StagePolicy {
        match self {
            Self::One => StagePolicy {
                headroom: 0.8,
                min_bitrate_kbps: 100,
                audio_bitrate_kbps: 128,
                preset: "fast",
                crf: None,
                video_filter: None,
                output_suffix: "_compressed",
            },
            Self::Two => StagePolicy {
                headroom: 0.6,
                min_bitrate_kbps: 50,
                audio_bitrate_kbps: 64,
                preset: "ultrafast",
                crf: Some(28),
                video_filter: Some(EVEN_DIMENSIONS_FILTER),
                output_suffix: "_compressed_aggressive",
            },
        }
    }

    /// Output path for this stage, next to the input
    pub fn output_path(self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        input.with_file_name(format!("{}{}.mp4", stem, self.policy().output_suffix))
    }

    pub fn attempt(self, input: &Path, target_bitrate_kbps: u32) -> CompressionAttempt {
        let policy = self.policy();
        CompressionAttempt {
            input_path: input.to_path_buf(),
            target_bitrate_kbps,
            audio_bitrate_kbps: policy.audio_bitrate_kbps,
            preset: policy.preset,
            crf: policy.crf,
            video_filter: policy.video_filter,
            output_path: self.output_path(input),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {}", self.number())
    }
}

/// `floor(max_size_bytes * headroom * 8 / duration / 1000)` kbps
pub fn target_bitrate_kbps(max_size_bytes: u64, headroom: f64, duration_seconds: f64) -> u32 {
    let kbps = (max_size_bytes as f64 * headroom * 8.0 / duration_seconds / 1000.0).floor();
    if kbps.is_finite() && kbps > 0.0 {
        kbps.min(u32::MAX as f64) as u32
    } else {
        0
    }
}

/// Bitrate for `stage`, or the reason it cannot be attempted.
///
/// A later stage is always kept strictly below the previous stage's target.
pub fn plan_bitrate(
    stage: Stage,
    max_size_bytes: u64,
    duration_seconds: f64,
    previous_kbps: Option<u32>,
) -> Result<u32, RejectReason> {
    let policy = stage.policy();
    let mut target = target_bitrate_kbps(max_size_bytes, policy.headroom, duration_seconds);
    if let Some(previous) = previous_kbps {
        target = target.min(previous.saturating_sub(1));
    }
    if target < policy.min_bitrate_kbps {
        return Err(RejectReason::BitrateFloor {
            target_kbps: target,
            floor_kbps: policy.min_bitrate_kbps,
        });
    }
    Ok(target)
}

/// Why the planner gave up
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("Could not determine video duration: {0}")]
    DurationUnavailable(String),

    #[error("Target bitrate {target_kbps} kbps is below the {floor_kbps} kbps floor")]
    BitrateFloor { target_kbps: u32, floor_kbps: u32 },

    #[error("Encoder failed: {stderr}")]
    EncodeFailed { stderr: String },

    #[error("Compressed file is still too large ({size_bytes} bytes)")]
    StillTooLarge { size_bytes: u64 },

    #[error("Compression was cancelled")]
    Cancelled,

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl RejectReason {
    /// Stable snake-case identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DurationUnavailable(_) => "duration_unavailable",
            Self::BitrateFloor { .. } => "bitrate_floor",
            Self::EncodeFailed { .. } => "encode_failed",
            Self::StillTooLarge { .. } => "still_too_large",
            Self::Cancelled => "cancelled",
            Self::Worker(_) => "worker_failed",
        }
    }
}

/// Terminal failure of the planner
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct Rejection {
    pub reason: RejectReason,
    /// `None` when the planner failed before any stage began (probe)
    pub stage: Option<Stage>,
}

impl Rejection {
    pub fn new(reason: RejectReason, stage: Option<Stage>) -> Self {
        Self { reason, stage }
    }
}

/// Decision after a stage's encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Accepted,
    Rejected(RejectReason),
    NeedsEscalation(Stage),
}

/// Decide what follows an encode at `stage`.
///
/// `output_size` is `None` when the output file is missing. The ceiling is inclusive.
pub fn transition(stage: Stage, outcome: &ExitOutcome, output_size: Option<u64>, max_size_bytes: u64) -> Transition {
    let size = match output_size {
        Some(size) if outcome.succeeded => size,
        _ => {
            let stderr = if outcome.stderr_text.is_empty() && outcome.succeeded {
                "encoder reported success but produced no output".to_string()
            } else {
                outcome.stderr_text.clone()
            };
            return Transition::Rejected(RejectReason::EncodeFailed { stderr });
        }
    };

    if size <= max_size_bytes {
        return Transition::Accepted;
    }

    match stage.next() {
        Some(next) => Transition::NeedsEscalation(next),
        None => Transition::Rejected(RejectReason::StillTooLarge { size_bytes: size }),
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed rejected output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Runs the escalation against a [`Transcoder`] on the worker pool
#[derive(Clone)]
pub struct CompressionPlanner {
    transcoder: Arc<dyn Transcoder>,
    pool: WorkerPool,
}

impl CompressionPlanner {
    pub fn new(transcoder: Arc<dyn Transcoder>, pool: WorkerPool) -> Self {
        Self { transcoder, pool }
    }

    /// Compress `input` until it fits in `max_size_bytes`.
    ///
    /// On success the returned path is owned by the caller. `input` itself is
    /// never touched.
    pub async fn fit(
        &self,
        input: &Path,
        max_size_bytes: u64,
        cancel: &CancellationToken,
        progress: Option<&mpsc::UnboundedSender<PipelineEvent>>,
    ) -> Result<PathBuf, Rejection> {
        let transcoder = Arc::clone(&self.transcoder);
        let probe_path = input.to_path_buf();
        let duration = self
            .pool
            .run(move || transcoder.probe_duration(&probe_path))
            .await
            .map_err(|e| Rejection::new(RejectReason::Worker(e.to_string()), None))?
            .map_err(|e| {
                log::error!("Duration probe failed for {}: {}", input.display(), e);
                Rejection::new(RejectReason::DurationUnavailable(e.to_string()), None)
            })?;

        let mut stage = Stage::One;
        let mut previous_kbps = None;

        loop {
            if cancel.is_cancelled() {
                return Err(Rejection::new(RejectReason::Cancelled, Some(stage)));
            }

            let target = plan_bitrate(stage, max_size_bytes, duration, previous_kbps).map_err(|reason| {
                log::warn!("Compression {} rejected for {}: {}", stage, input.display(), reason);
                Rejection::new(reason, Some(stage))
            })?;
            log::info!(
                "Compression {}: {:.1}s at {} kbps to fit {}",
                stage,
                duration,
                target,
                format_file_size(max_size_bytes)
            );
            if let Some(tx) = progress {
                let _ = tx.send(PipelineEvent::EncodingStage {
                    stage,
                    target_bitrate_kbps: target,
                });
            }

            let attempt = stage.attempt(input, target);
            let output = attempt.output_path.clone();
            let transcoder = Arc::clone(&self.transcoder);
            let outcome = match self.pool.run(move || transcoder.encode(&attempt)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    remove_quietly(&output).await;
                    return Err(Rejection::new(RejectReason::Worker(e.to_string()), Some(stage)));
                }
            };

            let size = if outcome.succeeded {
                tokio::fs::metadata(&output).await.ok().map(|m| m.len())
            } else {
                None
            };

            match transition(stage, &outcome, size, max_size_bytes) {
                Transition::Accepted => {
                    log::info!(
                        "Compression {} accepted: {} ({})",
                        stage,
                        output.display(),
                        format_file_size(size.unwrap_or_default())
                    );
                    return Ok(output);
                }
                Transition::NeedsEscalation(next) => {
                    log::info!(
                        "Compression {} output is {}, over {}; escalating to {}",
                        stage,
                        format_file_size(size.unwrap_or_default()),
                        format_file_size(max_size_bytes),
                        next
                    );
                    remove_quietly(&output).await;
                    previous_kbps = Some(target);
                    stage = next;
                }
                Transition::Rejected(reason) => {
                    log::warn!("Compression {} rejected: {}", stage, reason);
                    remove_quietly(&output).await;
                    return Err(Rejection::new(reason, Some(stage)));
                }
            }
        }
    }
}
