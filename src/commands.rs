//! Execution of CLI commands: capture an image, recognize it, report the outcome.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::capture::{self, CapturedImage};
use crate::cli::{Cli, Command, ConfigCommand, RecognizeArgs};
use crate::config::{self, ConfigError};
use crate::ocr::{self, BackendKind, OcrBackendImpl, OcrError};
use crate::system::{self, CaptureError};

const PREVIEW_CHARS: usize = 100;

enum Source {
    Clipboard,
    Screenshot,
    File(PathBuf),
}

pub async fn execute(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Clipboard(args) => recognize(Source::Clipboard, args).await,
        Command::Screenshot(args) => recognize(Source::Screenshot, args).await,
        Command::File { path, args } => recognize(Source::File(path), args).await,
        Command::Check { backend } => check(backend),
        Command::Config { action } => configure(action),
    }
}

async fn recognize(source: Source, args: RecognizeArgs) -> Result<ExitCode> {
    let backend = match build_backend(args.backend)? {
        Ok(backend) => backend,
        Err(err) => return Ok(report_ocr_error(&err)),
    };
    debug!(backend = backend.name(), "Backend ready");

    let image = match acquire(source).await {
        Ok(Some(image)) => image,
        Ok(None) => {
            report(
                "No image in clipboard",
                "Please copy or screenshot an image containing text first",
            );
            return Ok(ExitCode::FAILURE);
        }
        Err(CaptureError::Cancelled) => {
            eprintln!("Screenshot cancelled");
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => return Err(err).context("Failed to get an image to recognize"),
    };

    info!(backend = backend.name(), path = %image.path().display(), "Recognizing text");
    let text = match backend
        .recognize_text(image.path(), args.prompt.as_deref())
        .await
    {
        Ok(text) => text,
        Err(err) => return Ok(report_ocr_error(&err)),
    };

    if text.trim().is_empty() {
        report(
            "No text recognized",
            "The image may not contain text, or the text is not clear enough",
        );
        return Ok(ExitCode::FAILURE);
    }

    println!("{text}");
    if !args.no_copy {
        match system::copy_text(&text) {
            Ok(()) => eprintln!(
                "✓ Copied recognition result: {}",
                ocr::preview(&text, PREVIEW_CHARS)
            ),
            Err(e) => warn!(error = %e, "Failed to copy result to clipboard"),
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Outer error: config could not be read. Inner error: the backend itself is misconfigured.
fn build_backend(kind: Option<BackendKind>) -> Result<Result<OcrBackendImpl, OcrError>> {
    let config = match config::load_backend_config(kind) {
        Ok(config) => config,
        Err(ConfigError::Backend(err)) => return Ok(Err(err)),
        Err(err) => return Err(err).context("Failed to load config"),
    };
    Ok(OcrBackendImpl::create(&config))
}

async fn acquire(source: Source) -> Result<Option<CapturedImage>, CaptureError> {
    match source {
        Source::Clipboard => blocking(capture::from_clipboard).await,
        Source::Screenshot => blocking(capture::from_screenshot).await.map(Some),
        Source::File(path) => capture::from_file(&path).map(Some),
    }
}

async fn blocking<T, F>(work: F) -> Result<T, CaptureError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CaptureError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CaptureError::Io(io::Error::other(e)))?
}

fn check(kind: Option<BackendKind>) -> Result<ExitCode> {
    let backend = match build_backend(kind)? {
        Ok(backend) => backend,
        Err(err) => return Ok(report_ocr_error(&err)),
    };

    println!("Backend: {} ({})", backend.name(), backend.kind());
    if let OcrBackendImpl::Vision(vision) = &backend {
        println!("Helper: {}", vision.helper().display());
    }

    if backend.validate_config() {
        println!("Configuration: valid");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Configuration: invalid");
        Ok(ExitCode::FAILURE)
    }
}

fn configure(action: ConfigCommand) -> Result<ExitCode> {
    match action {
        ConfigCommand::Show => {
            let cfg = config::load_full_config().context("Failed to load config")?;
            if let Some(path) = config::config_path() {
                eprintln!("# {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&cfg.redacted())?);
        }
        ConfigCommand::SetBackend { kind } => {
            config::save_ocr_backend(kind).context("Failed to save config")?;
            eprintln!("OCR backend set to {kind}");
        }
        ConfigCommand::SetLogLevel { level } => {
            config::save_log_level(level).context("Failed to save config")?;
            eprintln!("Log level set to {}", level.as_str());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn report_ocr_error(err: &OcrError) -> ExitCode {
    warn!(kind = %err.kind, error = %err, details = ?err.details, "OCR failed");
    let (title, message) = err.user_message();
    report(title, &message);
    ExitCode::FAILURE
}

fn report(title: &str, message: &str) {
    eprintln!("{}", failure_line(title, message));
}

fn failure_line(title: &str, message: &str) -> String {
    if message.is_empty() {
        format!("✗ {title}")
    } else {
        format!("✗ {title}: {message}")
    }
}
