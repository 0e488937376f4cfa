//! Logging initialization
//!
//! Console + file output through `simplelog`, level taken from `LOG_LEVEL`.

use simplelog::*;
use std::fs::File;
use std::io;
use std::str::FromStr;

/// Errors raised while setting up the logger
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to create log file {path}: {source}")]
    LogFile { path: String, source: io::Error },

    #[error("Failed to initialize logger: {0}")]
    Init(#[from] log::SetLoggerError),
}

/// Parse a level name, falling back to `Info` for unknown values
pub fn parse_level(name: &str) -> LevelFilter {
    LevelFilter::from_str(name.trim()).unwrap_or(LevelFilter::Info)
}

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Level name, e.g. "info" or "debug"
pub fn init_logger(log_file_path: &str, level: &str) -> Result<(), LoggingError> {
    let level = parse_level(level);
    let log_file = File::create(log_file_path).map_err(|source| LoggingError::LogFile {
        path: log_file_path.to_string(),
        source,
    })?;

    CombinedLogger::init(vec![
        TermLogger::new(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, Config::default(), log_file),
    ])?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level(" error "), LevelFilter::Error);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }
}
