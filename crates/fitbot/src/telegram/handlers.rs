//! Dispatcher schema and the download flow

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InputFile, Message, MessageId, ParseMode};
use tokio::sync::mpsc;

use fitcore::config;
use fitcore::core::is_valid_url;
use fitcore::download::{DownloadPipeline, DownloadRequest, FormatSelection, FormatSelector};

use super::bot::Command;
use super::keyboard::{parse_callback_data, quality_keyboard};
use super::messages;
use super::session::{PendingRequest, RequestContextStore};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub pipeline: Arc<DownloadPipeline>,
    pub sessions: Arc<RequestContextStore>,
}

impl HandlerDeps {
    pub fn new(pipeline: Arc<DownloadPipeline>, sessions: Arc<RequestContextStore>) -> Self {
        Self { pipeline, sessions }
    }
}

/// Creates the dispatcher schema for the bot.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler())
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn command_handler() -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        |bot: Bot, msg: Message, cmd: Command| async move {
            log::info!("Received command {:?} from chat {}", cmd, msg.chat.id);
            let text = match cmd {
                Command::Start => messages::WELCOME,
                Command::Help => messages::HELP,
                Command::About => messages::ABOUT,
            };
            bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
            Ok::<(), HandlerError>(())
        },
    ))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some_and(|text| !text.starts_with('/')))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_url_message(&bot, &msg, &deps).await {
                    log::error!("Failed to handle message in chat {}: {}", msg.chat.id, e);
                    let _ = bot.send_message(msg.chat.id, messages::UNEXPECTED).await;
                }
                Ok::<(), HandlerError>(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            bot.answer_callback_query(q.id.clone()).await?;

            let chat_id = q.message.as_ref().map(|m| m.chat().id);
            let message_id = q.message.as_ref().map(|m| m.id());
            let (Some(chat_id), Some(message_id)) = (chat_id, message_id) else {
                log::warn!("Callback query {:?} without a message", q.id);
                return Ok::<(), HandlerError>(());
            };

            if let Err(e) = handle_quality_selection(&bot, chat_id, message_id, q.data.as_deref(), &deps).await {
                log::error!("Failed to handle quality selection in chat {}: {}", chat_id, e);
                let _ = bot.send_message(chat_id, messages::UNEXPECTED).await;
            }
            Ok::<(), HandlerError>(())
        }
    })
}

async fn edit_status(bot: &Bot, chat_id: ChatId, message_id: MessageId, text: impl Into<String>) {
    if let Err(e) = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .await
    {
        log::debug!("Status edit failed in chat {}: {}", chat_id, e);
    }
}

async fn handle_url_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let url = text.trim();
    let chat_id = msg.chat.id;

    if !is_valid_url(url) {
        bot.send_message(chat_id, messages::INVALID_URL).await?;
        return Ok(());
    }

    log::info!("URL request from chat {}: {}", chat_id, url);
    let status = bot
        .send_message(chat_id, messages::PROCESSING)
        .parse_mode(ParseMode::Html)
        .await?;

    let inspection = match deps.pipeline.inspect(url).await {
        Ok(inspection) => inspection,
        Err(e) => {
            log::warn!("Inspection of {} failed ({}): {}", url, e.reason(), e);
            edit_status(bot, chat_id, status.id, messages::failure_message(&e, deps.pipeline.delivery_ceiling())).await;
            return Ok(());
        }
    };

    match inspection.selection {
        FormatSelection::Required { choices } => {
            let pending = PendingRequest {
                url: url.to_string(),
                title: inspection.info.title.clone(),
                choices: choices.iter().map(|c| c.selector()).collect(),
            };
            let request_id = deps.sessions.insert(pending).await;
            bot.edit_message_text(chat_id, status.id, messages::selection_prompt(&inspection.info))
                .parse_mode(ParseMode::Html)
                .reply_markup(quality_keyboard(&request_id, &choices))
                .await?;
        }
        FormatSelection::Automatic(selector) => {
            download_and_send(bot, deps, chat_id, status.id, url, selector).await;
        }
    }
    Ok(())
}

async fn handle_quality_selection(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    data: Option<&str>,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let Some((request_id, index)) = data.and_then(parse_callback_data) else {
        edit_status(bot, chat_id, message_id, messages::INVALID_SELECTION).await;
        return Ok(());
    };

    let Some(pending) = deps.sessions.take(request_id).await else {
        edit_status(bot, chat_id, message_id, messages::SESSION_EXPIRED).await;
        return Ok(());
    };

    let Some(selector) = pending.choices.get(index).cloned() else {
        edit_status(bot, chat_id, message_id, messages::INVALID_SELECTION).await;
        return Ok(());
    };

    log::info!("Chat {} picked {} for {:?}", chat_id, selector, pending.title);
    download_and_send(bot, deps, chat_id, message_id, &pending.url, selector).await;
    Ok(())
}

/// Run the pipeline in a fresh working directory and deliver the result.
///
/// Every outcome ends in a status edit or the video itself; nothing propagates.
async fn download_and_send(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    status_id: MessageId,
    url: &str,
    selector: FormatSelector,
) {
    let temp_root = config::TEMP_FILES_DIR.as_path();
    if let Err(e) = tokio::fs::create_dir_all(temp_root).await {
        log::error!("Failed to create temp root {}: {}", temp_root.display(), e);
    }
    let workdir = match tempfile::Builder::new().prefix(config::workdir::BOT_PREFIX).tempdir_in(temp_root) {
        Ok(dir) => dir,
        Err(e) => {
            log::error!("Failed to create working directory in {}: {}", temp_root.display(), e);
            edit_status(bot, chat_id, status_id, messages::UNEXPECTED).await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let request = DownloadRequest::new(url, selector, workdir.path()).with_progress(tx);

    let progress_bot = bot.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(text) = messages::progress_text(&event) {
                edit_status(&progress_bot, chat_id, status_id, text).await;
            }
        }
    });

    let result = deps.pipeline.run(&request).await;
    drop(request);
    let _ = forwarder.await;

    match result {
        Ok(file) => {
            edit_status(bot, chat_id, status_id, messages::UPLOADING).await;
            let sent = bot
                .send_video(chat_id, InputFile::file(file.path.clone()))
                .supports_streaming(true)
                .caption(messages::SUCCESS_CAPTION)
                .parse_mode(ParseMode::Html)
                .await;
            match sent {
                Ok(_) => {
                    log::info!("Delivered {} ({} bytes) to chat {}", url, file.size_bytes, chat_id);
                    let _ = bot.delete_message(chat_id, status_id).await;
                }
                Err(e) => {
                    log::error!("Failed to send video to chat {}: {}", chat_id, e);
                    edit_status(bot, chat_id, status_id, messages::UPLOAD_FAILED).await;
                }
            }
        }
        Err(e) => {
            log::warn!("Download of {} failed ({}): {}", url, e.reason(), e);
            edit_status(bot, chat_id, status_id, messages::failure_message(&e, deps.pipeline.delivery_ceiling())).await;
        }
    }

    if let Err(e) = workdir.close() {
        log::warn!("Failed to remove working directory: {}", e);
    }
}
