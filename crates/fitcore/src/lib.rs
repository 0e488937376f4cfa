//! fitcore - download-and-fit pipeline for a video delivery bot
//!
//! Resolves a video URL through an external extraction engine, downloads the
//! chosen format and re-encodes it when needed so the result fits under a
//! delivery size ceiling.
//!
//! # Module Structure
//!
//! - `core`: configuration, logging, process runner, worker pool, utilities
//! - `download`: format catalog, transcoder, compression planner, pipeline

pub mod core;
pub mod download;

// Re-export commonly used types for convenience
pub use core::{config, WorkerPool};
pub use download::{
    DeliveredFile, DownloadPipeline, DownloadRequest, FormatChoice, FormatSelection, FormatSelector, Inspection,
    MediaFormat, PipelineError, PipelineEvent, VideoInfo,
};
