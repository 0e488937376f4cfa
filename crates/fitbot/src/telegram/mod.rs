//! Telegram chat layer: commands, URL messages and quality selection

pub mod bot;
pub mod handlers;
pub mod keyboard;
pub mod messages;
pub mod session;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use session::RequestContextStore;
