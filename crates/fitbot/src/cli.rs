use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fitbot")]
#[command(author, version, about = "Telegram bot that downloads videos and fits them under the upload size limit", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the bot with long polling
    Run,

    /// Show metadata and downloadable formats for a URL
    Info {
        /// Video URL
        url: String,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a URL and fit it under the size limit, without Telegram
    Download {
        /// Video URL
        url: String,

        /// Format id from `info`, or "best"
        #[arg(short, long)]
        format: Option<String>,

        /// Directory to write the result into (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Size ceiling in bytes (default: 50 MiB)
        #[arg(long)]
        max_size: Option<u64>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_no_command() {
        let cli = Cli::try_parse_from(["fitbot"]).ok().map(|c| c.command);
        assert_eq!(cli, Some(None));
    }

    #[test]
    fn test_download_args() {
        let cli = Cli::try_parse_from([
            "fitbot",
            "download",
            "https://example.com/v",
            "--format",
            "22",
            "-o",
            "/tmp/out",
            "--max-size",
            "1000",
        ])
        .ok()
        .and_then(|c| c.command);
        assert_eq!(
            cli,
            Some(Commands::Download {
                url: "https://example.com/v".to_string(),
                format: Some("22".to_string()),
                output: Some(PathBuf::from("/tmp/out")),
                max_size: Some(1000),
            })
        );
    }

    #[test]
    fn test_info_json_flag() {
        let cli = Cli::try_parse_from(["fitbot", "info", "https://example.com/v", "--json"])
            .ok()
            .and_then(|c| c.command);
        assert_eq!(
            cli,
            Some(Commands::Info {
                url: "https://example.com/v".to_string(),
                json: true,
            })
        );
    }
}
