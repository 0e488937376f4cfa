//! Quality selection keyboard and its callback data

use fitcore::core::utils::format_file_size;
use fitcore::download::{FormatChoice, MediaFormat};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Prefix of quality-selection callback data
pub const CALLBACK_PREFIX: &str = "dl";

pub const BEST_QUALITY_LABEL: &str = "🏆 Best Quality Available";

/// Button label: `720p`, `720p (webm)`, `720p - 12.3 MB`
pub fn format_label(format: &MediaFormat) -> String {
    let mut label = match format.height {
        Some(height) if height > 0 => format!("{}p", height),
        _ => "Unknown".to_string(),
    };
    if !format.ext.is_empty() && format.ext != "mp4" {
        label.push_str(&format!(" ({})", format.ext));
    }
    if let Some(size) = format.filesize.filter(|s| *s > 0) {
        label.push_str(&format!(" - {}", format_file_size(size)));
    }
    label
}

pub fn choice_label(choice: &FormatChoice) -> String {
    match choice {
        FormatChoice::Format(format) => format_label(format),
        FormatChoice::BestAvailable => BEST_QUALITY_LABEL.to_string(),
    }
}

/// `dl:<request-id>:<choice-index>`
pub fn callback_data(request_id: &str, index: usize) -> String {
    format!("{}:{}:{}", CALLBACK_PREFIX, request_id, index)
}

/// Inverse of [`callback_data`]
pub fn parse_callback_data(data: &str) -> Option<(&str, usize)> {
    let mut parts = data.splitn(3, ':');
    if parts.next()? != CALLBACK_PREFIX {
        return None;
    }
    let request_id = parts.next().filter(|id| !id.is_empty())?;
    let index = parts.next()?.parse().ok()?;
    Some((request_id, index))
}

/// One button per row, in choice order
pub fn quality_keyboard(request_id: &str, choices: &[FormatChoice]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = choices
        .iter()
        .enumerate()
        .map(|(index, choice)| {
            vec![InlineKeyboardButton::callback(
                choice_label(choice),
                callback_data(request_id, index),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}
