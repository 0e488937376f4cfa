use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use fitcore::core::init_logger;
use fitcore::core::utils::{format_duration, format_file_size, sweep_stale_workdirs};
use fitcore::download::{Ffmpeg, YtDlpEngine};
use fitcore::{config, DownloadPipeline, DownloadRequest, FormatSelection, FormatSelector, MediaFormat};

mod cli;
mod telegram;

use cli::{Cli, Commands};
use telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, RequestContextStore};

/// Entry point: parses CLI arguments and dispatches to the subcommand.
/// Running without a subcommand starts the bot.
#[tokio::main]
async fn main() -> Result<()> {
    // .env first so config statics see its values
    let _ = dotenv();

    let cli = Cli::parse_args();

    init_logger(&config::LOG_FILE_PATH, &config::LOG_LEVEL)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Info { url, json }) => run_cli_info(url, json).await,
        Some(Commands::Download {
            url,
            format,
            output,
            max_size,
        }) => run_cli_download(url, format, output, max_size).await,
    }
}

/// Verify the external tools are present. Missing tools are logged, not fatal:
/// requests will fail with a user-facing message instead.
async fn check_tools() {
    let checks = tokio::task::spawn_blocking(|| {
        (
            YtDlpEngine::default().check_available(),
            Ffmpeg::default().check_available(),
        )
    })
    .await;

    match checks {
        Ok((true, true)) => log::info!("External tools OK"),
        Ok((ytdlp, ffmpeg)) => log::warn!("External tools missing: yt-dlp={} ffmpeg/ffprobe={}", ytdlp, ffmpeg),
        Err(e) => log::warn!("Tool check did not complete: {}", e),
    }
}

/// Remove bot work dirs left by a crash or kill
async fn sweep_workdirs() {
    let swept = tokio::task::spawn_blocking(|| {
        sweep_stale_workdirs(&config::TEMP_FILES_DIR, config::workdir::BOT_PREFIX)
    })
    .await;
    if let Err(e) = swept {
        log::warn!("Temp sweep did not complete: {}", e);
    }
}

async fn run_bot() -> Result<()> {
    log::info!("Starting fitbot...");
    check_tools().await;
    sweep_workdirs().await;

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let deps = HandlerDeps::new(
        Arc::new(DownloadPipeline::with_defaults()),
        Arc::new(RequestContextStore::with_defaults()),
    );
    log::info!("Worker pool size: {}", *config::workers::POOL_SIZE);

    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    sweep_workdirs().await;
    Ok(())
}

#[derive(Serialize)]
struct FormatReport<'a> {
    format_id: &'a str,
    height: Option<u32>,
    ext: &'a str,
    filesize: Option<u64>,
}

#[derive(Serialize)]
struct InfoReport<'a> {
    title: &'a str,
    duration_seconds: Option<f64>,
    uploader: Option<&'a str>,
    playlist_title: Option<&'a str>,
    formats: Vec<FormatReport<'a>>,
    selection_required: bool,
}

fn format_report(format: &MediaFormat) -> FormatReport<'_> {
    FormatReport {
        format_id: &format.format_id,
        height: format.height,
        ext: &format.ext,
        filesize: format.size_hint(),
    }
}

async fn run_cli_info(url: String, json: bool) -> Result<()> {
    let pipeline = DownloadPipeline::with_defaults();
    let inspection = pipeline
        .inspect(&url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get info: {}", e))?;
    let info = &inspection.info;

    if json {
        let report = InfoReport {
            title: &info.title,
            duration_seconds: info.duration_seconds,
            uploader: info.uploader.as_deref(),
            playlist_title: info.playlist.as_ref().and_then(|p| p.title.as_deref()),
            formats: info.formats.iter().map(format_report).collect(),
            selection_required: inspection.selection.is_required(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🎬 Video Information");
    println!("====================");
    println!("URL: {}\n", url);
    println!("Title: {}", info.title);
    if let Some(duration) = info.duration_seconds {
        println!("Duration: {}", format_duration(duration));
    }
    if let Some(uploader) = &info.uploader {
        println!("Uploader: {}", uploader);
    }
    if let Some(playlist) = &info.playlist {
        println!(
            "Playlist: {} (first entry only)",
            playlist.title.as_deref().unwrap_or("untitled")
        );
    }

    println!("\nFormats:");
    for format in &info.formats {
        let height = format.height.map(|h| format!("{}p", h)).unwrap_or_else(|| "?".to_string());
        let size = format.size_hint().map(format_file_size).unwrap_or_default();
        println!("  {:<12} {:>6} {:<5} {}", format.format_id, height, format.ext, size);
    }

    if let FormatSelection::Required { .. } = inspection.selection {
        println!("\nPick one with: fitbot download {} --format <id>", url);
    }
    Ok(())
}

/// Make a title usable as a file name
fn sanitize_file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

fn output_path(dir: &Path, title: &str, delivered: &Path) -> PathBuf {
    let ext = delivered.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
    dir.join(format!("{}.{}", sanitize_file_stem(title), ext))
}

async fn run_cli_download(
    url: String,
    format: Option<String>,
    output: Option<PathBuf>,
    max_size: Option<u64>,
) -> Result<()> {
    let mut pipeline = DownloadPipeline::with_defaults();
    if let Some(bytes) = max_size {
        pipeline = pipeline.with_delivery_ceiling(bytes);
    }

    println!("🎬 fitbot CLI Download");
    println!("======================");
    println!("URL: {}", url);
    println!("Size limit: {}", format_file_size(pipeline.delivery_ceiling()));

    let inspection = pipeline
        .inspect(&url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get info: {}", e))?;
    let selector = format.as_deref().map(FormatSelector::parse).unwrap_or_default();
    println!("Title: {}", inspection.info.title);
    println!("Format: {}", selector);

    let workdir = tempfile::Builder::new()
        .prefix(config::workdir::CLI_PREFIX)
        .tempdir_in(&*config::TEMP_FILES_DIR)
        .context("Failed to create working directory")?;

    let request = DownloadRequest::new(url, selector, workdir.path());
    let delivered = pipeline
        .run(&request)
        .await
        .map_err(|e| anyhow::anyhow!("Download failed ({}): {}", e.reason(), e))?;

    let output_dir = output.unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let target = output_path(&output_dir, &inspection.info.title, &delivered.path);
    tokio::fs::copy(&delivered.path, &target)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!(
        "\n✅ Saved {} ({}{})",
        target.display(),
        format_file_size(delivered.size_bytes),
        if delivered.compressed { ", re-encoded" } else { "" }
    );
    Ok(())
}
