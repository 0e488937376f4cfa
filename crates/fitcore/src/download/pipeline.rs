//! Download-and-fit pipeline orchestrator.
//!
//! Two entry points:
//! - `inspect()`: resolve metadata → filter and rank formats → decide whether the user must choose
//! - `run()`: download → resolve local file → check size → compress if oversized → deliver
//!
//! All blocking work (engine calls, probing, encoding) is submitted to the
//! worker pool, so the caller's scheduler keeps serving other users.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::config;
use crate::core::utils::format_file_size;
use crate::core::WorkerPool;

use super::catalog::{filter_and_rank, select, FormatSelection};
use super::compression::CompressionPlanner;
use super::error::PipelineError;
use super::extractor::{ExtractionEngine, YtDlpEngine};
use super::models::{DeliveredFile, DownloadRequest, PipelineEvent, VideoInfo};
use super::transcoder::{Ffmpeg, Transcoder};

/// File stem every download is saved under inside its request directory
pub const SOURCE_STEM: &str = "source";

/// Extensions probed, in order, when the engine does not report the final path
pub const FALLBACK_EXTENSIONS: [&str; 5] = ["mp4", "mkv", "webm", "avi", "mov"];

/// Terminal value of [`DownloadPipeline::run`]
pub type DownloadResult = Result<DeliveredFile, PipelineError>;

/// Metadata plus the selection decision for a URL
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    /// `info.formats` holds the filtered, ranked formats
    pub info: VideoInfo,
    pub selection: FormatSelection,
}

/// Find the downloaded file.
///
/// The engine-reported path wins when it exists; otherwise `base` is tried
/// with each of [`FALLBACK_EXTENSIONS`].
pub async fn resolve_local_file(reported: Option<&Path>, base: &Path) -> Option<PathBuf> {
    if let Some(path) = reported {
        if is_file(path).await {
            return Some(path.to_path_buf());
        }
        log::warn!("Engine reported {} but it does not exist", path.display());
    }

    for ext in FALLBACK_EXTENSIONS {
        let candidate = base.with_extension(ext);
        if is_file(&candidate).await {
            return Some(candidate);
        }
    }
    None
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

pub struct DownloadPipeline {
    engine: Arc<dyn ExtractionEngine>,
    planner: CompressionPlanner,
    pool: WorkerPool,
    delivery_ceiling: u64,
}

impl DownloadPipeline {
    pub fn new(engine: Arc<dyn ExtractionEngine>, transcoder: Arc<dyn Transcoder>, pool: WorkerPool) -> Self {
        Self {
            engine,
            planner: CompressionPlanner::new(transcoder, pool.clone()),
            pool,
            delivery_ceiling: config::limits::MAX_DELIVERY_SIZE_BYTES,
        }
    }

    /// yt-dlp + ffmpeg with settings from the environment
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(YtDlpEngine::default()),
            Arc::new(Ffmpeg::default()),
            WorkerPool::default(),
        )
    }

    pub fn with_delivery_ceiling(mut self, bytes: u64) -> Self {
        self.delivery_ceiling = bytes;
        self
    }

    pub fn delivery_ceiling(&self) -> u64 {
        self.delivery_ceiling
    }

    /// Resolve metadata for `url` and decide whether a format must be chosen
    pub async fn inspect(&self, url: &str) -> Result<Inspection, PipelineError> {
        let engine = Arc::clone(&self.engine);
        let owned_url = url.to_string();
        let mut info = self
            .pool
            .run(move || engine.resolve_info(&owned_url))
            .await?
            .map_err(PipelineError::extraction)?;

        let raw_count = info.formats.len();
        let ranked = filter_and_rank(std::mem::take(&mut info.formats));
        if ranked.is_empty() {
            log::warn!("No downloadable formats for {} ({} raw formats)", url, raw_count);
            return Err(PipelineError::NoDownloadableFormat);
        }

        let selection = select(&ranked);
        log::info!(
            "Inspected {}: {} of {} formats usable, selection {}",
            url,
            ranked.len(),
            raw_count,
            if selection.is_required() { "required" } else { "automatic" }
        );
        info.formats = ranked;
        Ok(Inspection { info, selection })
    }

    /// Download the requested format and fit it under the delivery ceiling
    pub async fn run(&self, request: &DownloadRequest) -> DownloadResult {
        // ── Step 1: Prepare the request directory ──
        if request.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let dir = &request.destination_dir;
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            log::error!("Failed to create {}: {}", dir.display(), e);
            PipelineError::Worker(format!("cannot create {}: {}", dir.display(), e))
        })?;

        // ── Step 2: Download through the engine ──
        request.emit(PipelineEvent::Downloading);
        log::info!("Downloading {} (format {})", request.url, request.selector);
        let engine = Arc::clone(&self.engine);
        let url = request.url.clone();
        let selector = request.selector.clone();
        let template = dir.join(format!("{}.%(ext)s", SOURCE_STEM));
        let reported = self
            .pool
            .run(move || engine.download(&url, &selector, &template))
            .await?
            .map_err(|e| {
                log::error!("Download failed for {}: {}", request.url, e);
                PipelineError::transfer(e)
            })?;

        // ── Step 3: Resolve the local file ──
        let base = dir.join(SOURCE_STEM);
        let path = resolve_local_file(reported.as_deref(), &base)
            .await
            .ok_or_else(|| PipelineError::FileNotFound(base.clone()))?;
        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|_| PipelineError::FileNotFound(path.clone()))?
            .len();
        log::info!("Downloaded {} ({})", path.display(), format_file_size(size));

        // ── Step 4: Check size against the ceiling (inclusive) ──
        if size <= self.delivery_ceiling {
            request.emit(PipelineEvent::Ready { size_bytes: size });
            return Ok(DeliveredFile {
                path,
                size_bytes: size,
                compressed: false,
            });
        }

        // ── Step 5: Compress ──
        if request.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        log::info!(
            "{} is {}, over the {} ceiling; compressing",
            path.display(),
            format_file_size(size),
            format_file_size(self.delivery_ceiling)
        );
        request.emit(PipelineEvent::Compressing {
            size_bytes: size,
            ceiling_bytes: self.delivery_ceiling,
        });
        let compressed = self
            .planner
            .fit(&path, self.delivery_ceiling, &request.cancel, request.progress.as_ref())
            .await?;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::warn!("Failed to remove source {}: {}", path.display(), e);
        }
        let compressed_size = tokio::fs::metadata(&compressed)
            .await
            .map_err(|_| PipelineError::FileNotFound(compressed.clone()))?
            .len();

        // ── Step 6: Deliver ──
        request.emit(PipelineEvent::Ready {
            size_bytes: compressed_size,
        });
        Ok(DeliveredFile {
            path: compressed,
            size_bytes: compressed_size,
            compressed: true,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_prefers_reported_path() {
        let dir = tempfile::tempdir().unwrap();
        let reported = dir.path().join("other.mkv");
        std::fs::write(&reported, b"x").unwrap();
        std::fs::write(dir.path().join("source.mp4"), b"x").unwrap();

        let found = resolve_local_file(Some(&reported), &dir.path().join(SOURCE_STEM)).await;
        assert_eq!(found, Some(reported));
    }

    #[tokio::test]
    async fn test_resolve_falls_back_in_extension_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("source.mov"), b"x").unwrap();
        std::fs::write(dir.path().join("source.webm"), b"x").unwrap();
        let missing = dir.path().join("gone.mp4");

        let found = resolve_local_file(Some(&missing), &dir.path().join(SOURCE_STEM)).await;
        assert_eq!(found, Some(dir.path().join("source.webm")));
    }

    #[tokio::test]
    async fn test_resolve_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("source.flv"), b"x").unwrap();
        assert_eq!(resolve_local_file(None, &dir.path().join(SOURCE_STEM)).await, None);
    }
}
