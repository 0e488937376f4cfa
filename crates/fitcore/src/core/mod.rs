//! Core utilities, configuration, and common functionality

pub mod config;
pub mod logging;
pub mod process;
pub mod utils;
pub mod validation;
pub mod workers;

// Re-exports for convenience
pub use logging::init_logger;
pub use validation::{is_valid_url, validate_url};
pub use workers::{WorkerError, WorkerPool};
