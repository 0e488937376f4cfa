//! Download-and-fit pipeline: format catalog, engines, compression planner

pub mod catalog;
pub mod compression;
pub mod error;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod transcoder;
pub mod ytdlp_errors;

pub use catalog::{filter_and_rank, FormatChoice, FormatSelection};
pub use compression::{CompressionPlanner, Stage};
pub use error::{Advice, EngineError, PipelineError};
pub use extractor::{ExtractionEngine, YtDlpEngine};
pub use models::{
    DeliveredFile, DownloadRequest, FormatSelector, MediaFormat, PipelineEvent, PlaylistOrigin, VideoInfo,
};
pub use pipeline::{DownloadPipeline, DownloadResult, Inspection};
pub use transcoder::{Ffmpeg, Transcoder};
pub use ytdlp_errors::ExtractionFailure;
