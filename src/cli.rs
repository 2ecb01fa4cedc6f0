//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::LogLevel;
use crate::ocr::BackendKind;

#[derive(Parser, Debug)]
#[command(name = "snap-ocr")]
#[command(about = "Recognize text in images with macOS Vision or a hosted vision model")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recognize text in the image on the clipboard
    Clipboard(RecognizeArgs),
    /// Select a screen region and recognize the text in it
    Screenshot(RecognizeArgs),
    /// Recognize text in an image file
    File {
        path: PathBuf,
        #[command(flatten)]
        args: RecognizeArgs,
    },
    /// Show which backend would be used and whether its configuration looks valid
    Check {
        /// Backend to check instead of the configured one
        #[arg(short, long)]
        backend: Option<BackendKind>,
    },
    /// Inspect or change the config file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct RecognizeArgs {
    /// Instruction sent to hosted models instead of the default OCR prompt
    #[arg(short, long)]
    pub prompt: Option<String>,
    /// Backend to use for this run: vision, openai or gemini
    #[arg(short, long)]
    pub backend: Option<BackendKind>,
    /// Print the result without copying it to the clipboard
    #[arg(long)]
    pub no_copy: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the config file with API keys redacted
    Show,
    /// Select the default backend
    SetBackend { kind: BackendKind },
    /// Set the log level used when RUST_LOG is unset
    SetLogLevel {
        #[arg(value_parser = parse_log_level)]
        level: LogLevel,
    },
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::from_str(s).ok_or_else(|| format!("unknown log level: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn clipboard_takes_recognize_flags() {
        let cli = Cli::try_parse_from([
            "snap-ocr",
            "clipboard",
            "--prompt",
            "Only the table",
            "--backend",
            "gemini",
            "--no-copy",
        ])
        .unwrap();
        let Command::Clipboard(args) = cli.command else {
            panic!("expected clipboard command");
        };
        assert_eq!(
            args,
            RecognizeArgs {
                prompt: Some("Only the table".to_string()),
                backend: Some(BackendKind::Gemini),
                no_copy: true,
            }
        );
    }

    #[test]
    fn file_takes_a_path() {
        let cli = Cli::try_parse_from(["snap-ocr", "file", "/tmp/scan.png"]).unwrap();
        let Command::File { path, args } = cli.command else {
            panic!("expected file command");
        };
        assert_eq!(path, PathBuf::from("/tmp/scan.png"));
        assert_eq!(args, RecognizeArgs::default());
    }

    #[test]
    fn unknown_backend_is_rejected_at_parse_time() {
        let err = Cli::try_parse_from(["snap-ocr", "screenshot", "--backend", "tesseract"])
            .unwrap_err();
        assert!(err.to_string().contains("Unknown backend type: tesseract"));
    }

    #[test]
    fn config_subcommands_parse() {
        let cli = Cli::try_parse_from(["snap-ocr", "config", "set-backend", "openai"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigCommand::SetBackend {
                    kind: BackendKind::OpenAi
                }
            }
        ));

        let cli = Cli::try_parse_from(["snap-ocr", "config", "set-log-level", "debug"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigCommand::SetLogLevel {
                    level: LogLevel::Debug
                }
            }
        ));
    }
}
