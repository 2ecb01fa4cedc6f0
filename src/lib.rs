//! snap-ocr: recognize text from the clipboard, a screenshot or an image file using the
//! on-device Vision helper or a hosted multimodal model.

pub mod capture;
pub mod cli;
mod commands;
pub mod config;
pub mod ocr;
pub mod paths;
pub mod system;

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

pub use ocr::{BackendConfig, BackendKind, ErrorKind, OcrBackendImpl, OcrError};

/// Logs go to stderr so stdout carries only recognized text. `RUST_LOG` wins over
/// the configured level.
fn init_tracing() {
    let level = config::load_log_level();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.filter())),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> ExitCode {
    let cli = cli::Cli::parse();
    init_tracing();
    debug!(command = ?cli.command, "Starting snap-ocr");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(commands::execute(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
