//! User-facing texts (HTML parse mode)

use fitcore::core::utils::{format_duration, format_file_size};
use fitcore::download::{Advice, PipelineError, PipelineEvent, VideoInfo};
use teloxide::utils::html::escape;

pub const WELCOME: &str = "🎥 <b>Video Downloader Bot</b>

Welcome! I can download videos from various platforms including:
• YouTube
• Instagram
• Twitter/X
• TikTok
• Facebook
• And many more!

<b>How to use:</b>
1. Send me a video URL
2. Choose video quality (if available)
3. Wait for download and processing
4. Receive your video!

<b>Commands:</b>
/start - Show this message
/help - Get help
/about - About this bot

Just send me any video URL to get started! 🚀";

pub const HELP: &str = "🆘 <b>Help - Video Downloader Bot</b>

<b>Supported Platforms:</b>
• YouTube (youtube.com, youtu.be)
• Instagram (instagram.com)
• Twitter/X (twitter.com, x.com)
• TikTok (tiktok.com)
• Facebook (facebook.com)
• Reddit (reddit.com)
• And 1000+ other sites!

<b>How to Download:</b>
1. Copy the video URL from any supported platform
2. Send the URL to this bot
3. Select quality if options are available
4. Wait for processing
5. Download your video!

<b>File Size Limits:</b>
• Maximum file size: 50MB for bots
• Large files will be compressed automatically

<b>Tips:</b>
• Make sure the video is public/accessible
• Private videos cannot be downloaded
• For playlists only the first video is downloaded";

pub const ABOUT: &str = "ℹ️ <b>About Video Downloader Bot</b>

This bot helps you download videos from various social media platforms and video hosting sites.

<b>Technology Stack:</b>
• Rust (tokio + teloxide)
• yt-dlp for video extraction
• FFmpeg for video processing
• Telegram Bot API

<b>Features:</b>
• Support for 1000+ websites
• Multiple quality options
• Automatic video compression
• Fast and reliable downloads

⚠️ <b>Disclaimer:</b>
Please respect copyright laws and platform terms of service when downloading videos.";

pub const INVALID_URL: &str = "❌ Please send a valid video URL.\n\nExample: https://www.youtube.com/watch?v=...";

pub const PROCESSING: &str = "🔍 <b>Processing your request...</b>\nExtracting video information...";

pub const DOWNLOADING: &str =
    "⬇️ <b>Downloading video...</b>\nThis may take a few moments depending on video size.";

pub const UPLOADING: &str = "⬆️ <b>Uploading video...</b>\nAlmost done!";

pub const SUCCESS_CAPTION: &str = "✅ <b>Video downloaded successfully!</b>";

pub const SESSION_EXPIRED: &str = "❌ Session expired. Please send the URL again.";

pub const INVALID_SELECTION: &str = "❌ Invalid selection. Please try again.";

pub const UPLOAD_FAILED: &str = "❌ <b>Upload Failed</b>\nCould not send the video. Please try again later.";

pub const UNEXPECTED: &str = "❌ An unexpected error occurred. Please try again later.";

/// Title block shown above the quality keyboard
pub fn selection_prompt(info: &VideoInfo) -> String {
    let mut text = format!("🎥 <b>{}</b>\n\n", escape(&info.title));
    if let Some(duration) = info.duration_seconds {
        text.push_str(&format!("⏱ Duration: {}\n", format_duration(duration)));
    }
    text.push_str(&format!(
        "👤 Uploader: {}\n",
        escape(info.uploader.as_deref().unwrap_or("Unknown"))
    ));
    if let Some(playlist) = &info.playlist {
        text.push_str(&format!(
            "📃 From playlist {}: only the first video is downloaded\n",
            escape(playlist.title.as_deref().unwrap_or("(untitled)"))
        ));
    }
    text.push_str("\nSelect video quality:");
    text
}

/// Status text for a progress event. `None` keeps the current status.
pub fn progress_text(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::Downloading => Some(DOWNLOADING.to_string()),
        PipelineEvent::Compressing {
            size_bytes,
            ceiling_bytes,
        } => Some(format!(
            "🔄 <b>Compressing video...</b>\nFile is {}, compressing to fit the {} limit.",
            format_file_size(*size_bytes),
            format_file_size(*ceiling_bytes)
        )),
        PipelineEvent::EncodingStage {
            stage,
            target_bitrate_kbps,
        } => Some(format!(
            "🔄 <b>Compressing video...</b>\nPass {} at {} kbps.",
            stage.number(),
            target_bitrate_kbps
        )),
        PipelineEvent::Ready { .. } => None,
    }
}

/// Failure text, worded by what the user can do about it.
/// `ceiling_bytes` is the delivery limit the pipeline ran with.
pub fn failure_message(err: &PipelineError, ceiling_bytes: u64) -> String {
    let headline = match err {
        PipelineError::NoDownloadableFormat => "❌ <b>Download Not Available</b>".to_string(),
        PipelineError::SizeBudgetExceeded { .. } | PipelineError::Encode { .. } | PipelineError::Probe(_) => format!(
            "❌ <b>Compression Failed</b>\nVideo is too large and could not be compressed under {}.",
            format_file_size(ceiling_bytes)
        ),
        PipelineError::Extraction { .. } => "❌ <b>Error</b>\nCould not extract video information.".to_string(),
        _ => "❌ <b>Download Failed</b>".to_string(),
    };
    let advice = match err.advice() {
        Advice::TryDifferentVideo => "It may be private, restricted or too long. Please try a different video.",
        Advice::TryAgainLater => "Please try again in a few minutes.",
        Advice::PlatformUnsupported => "This site or link type is not supported.",
    };
    format!("{}\n\n{}", headline, advice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitcore::config;
    use fitcore::download::{EngineError, ExtractionFailure, PlaylistOrigin, Stage};

    const CEILING: u64 = config::limits::MAX_DELIVERY_SIZE_BYTES;

    fn info() -> VideoInfo {
        VideoInfo {
            title: "Cats & <Dogs>".to_string(),
            duration_seconds: Some(125.0),
            uploader: None,
            formats: Vec::new(),
            playlist: None,
        }
    }

    #[test]
    fn test_selection_prompt_escapes_title() {
        let text = selection_prompt(&info());
        assert!(text.contains("Cats &amp; &lt;Dogs&gt;"));
        assert!(text.contains("Duration: 2:05"));
        assert!(text.contains("Uploader: Unknown"));
        assert!(!text.contains("playlist"));
    }

    #[test]
    fn test_selection_prompt_mentions_playlist() {
        let mut info = info();
        info.playlist = Some(PlaylistOrigin {
            title: Some("Mix".to_string()),
            entry_count: Some(20),
        });
        assert!(selection_prompt(&info).contains("From playlist Mix"));
    }

    #[test]
    fn test_progress_text() {
        assert_eq!(progress_text(&PipelineEvent::Downloading).as_deref(), Some(DOWNLOADING));
        assert_eq!(progress_text(&PipelineEvent::Ready { size_bytes: 1 }), None);
        let stage = progress_text(&PipelineEvent::EncodingStage {
            stage: Stage::Two,
            target_bitrate_kbps: 1999,
        })
        .unwrap_or_default();
        assert!(stage.contains("Pass 2 at 1999 kbps"));
    }

    #[test]
    fn test_failure_message_follows_advice() {
        let unsupported = PipelineError::extraction(EngineError::new(ExtractionFailure::UnsupportedUrl, ""));
        assert!(failure_message(&unsupported, CEILING).contains("not supported"));

        let network = PipelineError::transfer(EngineError::new(ExtractionFailure::Network, ""));
        assert!(failure_message(&network, CEILING).contains("try again"));

        assert!(failure_message(&PipelineError::NoDownloadableFormat, CEILING).contains("different video"));
    }

    #[test]
    fn test_compression_failure_names_the_active_ceiling() {
        let err = PipelineError::Probe("no duration".to_string());
        assert!(failure_message(&err, config::limits::MAX_DELIVERY_SIZE_BYTES).contains("under 50.0 MB."));
        assert!(failure_message(&err, 10 * 1024 * 1024).contains("under 10.0 MB."));
    }
}
