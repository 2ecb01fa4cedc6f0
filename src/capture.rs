//! Turning the clipboard, a screenshot or a path on disk into an image file to recognize.
//!
//! Clipboard reads can block (e.g. on X11), so they run in a short-lived thread with a
//! timeout. Images this module writes live in the cache dir and are removed when the
//! `CapturedImage` is dropped; files the user pointed at are never touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use image::{ImageBuffer, ImageFormat, Rgba};
use tracing::{debug, info, warn};

use crate::paths;
use crate::system::{self, CaptureError, ClipboardImage};

/// Max time we wait for the system clipboard before giving up.
const CLIPBOARD_TIMEOUT_MS: u64 = 2000;
const TEMP_PREFIX: &str = "snap-ocr-";

fn run_with_timeout<T, F>(source: &'static str, timeout: Duration, work: F) -> Result<T, CaptureError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CaptureError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(source, timeout_ms = timeout.as_millis() as u64, "Capture timed out");
            Err(CaptureError::TimedOut(source))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            warn!(source, "Capture worker disconnected");
            Err(CaptureError::Clipboard(format!("{source} worker disconnected")))
        }
    }
}

/// Whether `path` is a temp image this app wrote and may delete.
pub fn is_owned_temp(path: &Path, cache_dir: &Path) -> bool {
    path.parent() == Some(cache_dir)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(TEMP_PREFIX))
            .unwrap_or(false)
}

fn temp_image_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(format!("{TEMP_PREFIX}{}.png", nanoid::nanoid!()))
}

fn prepare_cache_dir() -> Result<PathBuf, CaptureError> {
    let cache_dir = paths::get_cache_dir().map_err(CaptureError::NoCacheDir)?;
    fs::create_dir_all(&cache_dir)?;
    Ok(cache_dir)
}

/// Removes its file on drop, but only when it is one of our temp images.
#[derive(Debug)]
pub struct TempImage {
    path: PathBuf,
    cache_dir: PathBuf,
}

impl TempImage {
    fn new(path: PathBuf, cache_dir: PathBuf) -> Self {
        Self { path, cache_dir }
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        if !is_owned_temp(&self.path, &self.cache_dir) {
            debug!(path = %self.path.display(), "Not a temp image, leaving in place");
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Cleaned up temp image"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %self.path.display(), "Failed to remove temp image"),
        }
    }
}

/// An image ready for recognition. Dropping it cleans up any temp file behind it.
#[derive(Debug)]
pub struct CapturedImage {
    path: PathBuf,
    temp: Option<TempImage>,
}

impl CapturedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

/// Uses an image file the user named directly.
pub fn from_file(path: &Path) -> Result<CapturedImage, CaptureError> {
    if !path.is_file() {
        return Err(CaptureError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("No image file at {}", path.display()),
        )));
    }
    Ok(CapturedImage {
        path: path.to_path_buf(),
        temp: None,
    })
}

/// Image from the clipboard, or `None` when there is nothing image-like on it.
pub fn from_clipboard() -> Result<Option<CapturedImage>, CaptureError> {
    let content = run_with_timeout(
        "clipboard",
        Duration::from_millis(CLIPBOARD_TIMEOUT_MS),
        system::read_clipboard_image,
    )?;

    match content {
        None => Ok(None),
        Some(ClipboardImage::File(path)) => {
            info!(path = %path.display(), "Using image file from clipboard");
            Ok(Some(CapturedImage { path, temp: None }))
        }
        Some(ClipboardImage::Pixels { width, height, rgba }) => {
            let cache_dir = prepare_cache_dir()?;
            from_pixels(&cache_dir, width, height, rgba).map(Some)
        }
    }
}

/// Encodes RGBA pixels as a PNG temp file under `cache_dir`.
fn from_pixels(
    cache_dir: &Path,
    width: usize,
    height: usize,
    rgba: Vec<u8>,
) -> Result<CapturedImage, CaptureError> {
    let path = temp_image_path(cache_dir);
    let temp = TempImage::new(path.clone(), cache_dir.to_path_buf());

    let width = u32::try_from(width).map_err(|e| CaptureError::Encode(e.to_string()))?;
    let height = u32::try_from(height).map_err(|e| CaptureError::Encode(e.to_string()))?;
    let buffer = ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).ok_or_else(|| {
        CaptureError::Encode("pixel data does not match image dimensions".to_string())
    })?;
    buffer
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    info!(width, height, path = %path.display(), "Saved clipboard image");
    Ok(CapturedImage {
        path,
        temp: Some(temp),
    })
}

/// Interactive region screenshot. Blocks until the user selects or cancels.
pub fn from_screenshot() -> Result<CapturedImage, CaptureError> {
    let cache_dir = prepare_cache_dir()?;
    let path = temp_image_path(&cache_dir);
    let temp = TempImage::new(path.clone(), cache_dir);

    system::capture_screenshot(&path)?;
    Ok(CapturedImage {
        path,
        temp: Some(temp),
    })
}
