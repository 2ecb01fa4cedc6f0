//! System interactions (clipboard, screenshot)

mod clipboard;
mod screenshot;

use thiserror::Error;

pub use clipboard::{copy_text, image_path_from_text, read_clipboard_image, ClipboardImage};
pub use screenshot::capture_screenshot;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Clipboard error: {0}")]
    Clipboard(String),
    #[error("Screenshot failed: {0}")]
    Screenshot(String),
    #[error("Failed to encode clipboard image: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Screenshot selection cancelled by user")]
    Cancelled,
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
    #[error("Timed out waiting for the {0}")]
    TimedOut(&'static str),
    #[error("No cache directory available: {0}")]
    NoCacheDir(String),
}
