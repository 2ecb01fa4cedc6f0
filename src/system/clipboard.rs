//! Clipboard access: reading an image to recognize and copying the result back.

use std::path::{Path, PathBuf};

use arboard::Clipboard;
use tracing::debug;

use super::CaptureError;

/// Extensions accepted when the clipboard holds a path to an image file.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "heic"];

pub enum ClipboardImage {
    /// A copied file that is already an image on disk.
    File(PathBuf),
    /// Raw RGBA pixels, e.g. from a screenshot or a browser's "Copy Image".
    Pixels {
        width: usize,
        height: usize,
        rgba: Vec<u8>,
    },
}

/// Reads an image from the clipboard. `Ok(None)` when the clipboard holds neither
/// an image file path nor image data.
pub fn read_clipboard_image() -> Result<Option<ClipboardImage>, CaptureError> {
    let mut clipboard = Clipboard::new().map_err(|e| CaptureError::Clipboard(e.to_string()))?;

    if let Some(path) = clipboard
        .get_text()
        .ok()
        .and_then(|text| image_path_from_text(&text))
    {
        debug!(path = %path.display(), "Clipboard holds an image file path");
        return Ok(Some(ClipboardImage::File(path)));
    }

    match clipboard.get_image() {
        Ok(image) => {
            debug!(width = image.width, height = image.height, "Clipboard holds image data");
            Ok(Some(ClipboardImage::Pixels {
                width: image.width,
                height: image.height,
                rgba: image.bytes.into_owned(),
            }))
        }
        Err(arboard::Error::ContentNotAvailable) => {
            debug!("Clipboard has no image");
            Ok(None)
        }
        Err(e) => Err(CaptureError::Clipboard(e.to_string())),
    }
}

/// Interprets clipboard text as a path to an existing image file.
pub fn image_path_from_text(text: &str) -> Option<PathBuf> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.contains('\n') {
        return None;
    }
    let path = Path::new(trimmed.strip_prefix("file://").unwrap_or(trimmed));
    let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    (is_image && path.is_file()).then(|| path.to_path_buf())
}

pub fn copy_text(text: &str) -> Result<(), CaptureError> {
    let mut clipboard = Clipboard::new().map_err(|e| CaptureError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| CaptureError::Clipboard(e.to_string()))?;
    debug!(chars = text.chars().count(), "Copied text to clipboard");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn existing_image_paths_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("Scan.PNG");
        fs::write(&png, b"png").unwrap();

        assert_eq!(image_path_from_text(&format!("  {}\n", png.display())), Some(png.clone()));
        assert_eq!(image_path_from_text(&format!("file://{}", png.display())), Some(png));
    }

    #[test]
    fn non_image_or_missing_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        fs::write(&txt, b"hello").unwrap();

        assert_eq!(image_path_from_text(&txt.display().to_string()), None);
        assert_eq!(image_path_from_text("/nonexistent/photo.jpg"), None);
        assert_eq!(image_path_from_text("just some copied words"), None);
        assert_eq!(image_path_from_text(""), None);
    }

    #[test]
    fn multi_line_text_is_not_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("a.png");
        fs::write(&png, b"png").unwrap();
        let text = format!("{}\n{}", png.display(), png.display());
        assert_eq!(image_path_from_text(&text), None);
    }
}
