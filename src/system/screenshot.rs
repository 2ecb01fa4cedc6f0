//! Interactive screen region capture.

use std::path::Path;

use super::CaptureError;

/// Lets the user select a screen region and writes it as PNG to `dest`.
///
/// Returns `CaptureError::Cancelled` when the selection is dismissed (Escape).
#[cfg(target_os = "macos")]
pub fn capture_screenshot(dest: &Path) -> Result<(), CaptureError> {
    use std::process::Command;
    use tracing::{debug, error, info};

    debug!(path = %dest.display(), "Starting interactive screenshot region selection");

    // -i: interactive selection, -x: no sound
    let output = Command::new("/usr/sbin/screencapture")
        .arg("-i")
        .arg("-x")
        .arg(dest)
        .output()
        .map_err(|e| CaptureError::Screenshot(format!("Failed to execute screencapture: {e}")))?;

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code == 1 {
            debug!("User cancelled screenshot selection");
            return Err(CaptureError::Cancelled);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let error_msg = if stderr.trim().is_empty() {
            format!("screencapture failed with exit code {exit_code}")
        } else {
            format!("screencapture failed: {}", stderr.trim())
        };
        error!(error = %error_msg, "Screenshot capture failed");
        return Err(CaptureError::Screenshot(error_msg));
    }

    // screencapture exits 0 without writing a file when the selection is empty
    if !dest.exists() {
        debug!(path = %dest.display(), "Screenshot file was not created");
        return Err(CaptureError::Cancelled);
    }

    info!(path = %dest.display(), "Screenshot captured successfully");
    Ok(())
}

#[cfg(not(target_os = "macos"))]
pub fn capture_screenshot(_dest: &Path) -> Result<(), CaptureError> {
    Err(CaptureError::Unsupported("Screenshot capture"))
}
