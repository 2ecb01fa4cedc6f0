//! On-device recognition through the Vision helper program.
//!
//! The helper takes the image path as its only argument and prints a single JSON
//! object `{success, text?, error?}` on stdout. By default it is the
//! `vision-ocr.swift` script run by the Swift interpreter, which compiles it on first
//! use; that is what the 30 second timeout is sized for.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use super::{describe_duration, preview, OcrError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_SWIFT_BIN: &str = "swift";

#[derive(Debug, Deserialize)]
struct HelperOutput {
    success: bool,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct RawOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct VisionBackend {
    helper: PathBuf,
    interpreter: Option<PathBuf>,
    timeout: Duration,
    max_output: usize,
}

impl VisionBackend {
    /// `.swift` helpers run through the Swift interpreter, anything else is executed directly.
    pub fn new(helper: PathBuf) -> Self {
        let interpreter = helper
            .extension()
            .is_some_and(|ext| ext == "swift")
            .then(|| PathBuf::from(DEFAULT_SWIFT_BIN));
        Self {
            helper,
            interpreter,
            timeout: DEFAULT_TIMEOUT,
            max_output: MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_interpreter(mut self, interpreter: Option<PathBuf>) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// A precompiled helper does not need the compile-time margin of the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output = bytes;
        self
    }

    pub fn helper(&self) -> &Path {
        &self.helper
    }

    pub fn interpreter(&self) -> Option<&Path> {
        self.interpreter.as_deref()
    }

    pub fn name(&self) -> &'static str {
        "macOS Vision API"
    }

    /// Only checks that the helper exists; the engine itself is never started here.
    pub fn validate_config(&self) -> bool {
        self.helper.is_file()
    }

    pub async fn recognize_text(
        &self,
        image_path: &Path,
        custom_prompt: Option<&str>,
    ) -> Result<String, OcrError> {
        if custom_prompt.is_some() {
            debug!("Vision helper does not take prompts, ignoring custom prompt");
        }

        match tokio::fs::metadata(image_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(OcrError::invalid_image(format!(
                    "Not an image file: {}",
                    image_path.display()
                )))
            }
            Err(e) => {
                return Err(OcrError::invalid_image(format!(
                    "Failed to read image file: {e}"
                )))
            }
        }

        debug!(
            helper = %self.helper.display(),
            image = %image_path.display(),
            "Executing Vision OCR helper"
        );

        let mut child = self.command(image_path).spawn().map_err(|e| {
            error!(error = %e, helper = %self.helper.display(), "Failed to start OCR helper");
            OcrError::config(format!(
                "Failed to start OCR helper {}: {e}",
                self.helper.display()
            ))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let collected = tokio::time::timeout(
            self.timeout,
            collect_output(&mut child, stdout, stderr, self.max_output),
        )
        .await;

        let output = match collected {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                kill_and_reap(&mut child).await;
                return Err(e);
            }
            Err(_) => {
                kill_and_reap(&mut child).await;
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "OCR helper timed out"
                );
                return Err(OcrError::timeout(format!(
                    "OCR operation timed out after {}. This might happen on first run while Swift compiles the script.",
                    describe_duration(self.timeout)
                )));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(stderr = %stderr.trim(), "OCR helper stderr");
        }
        if !output.status.success() {
            debug!(code = output.status.code().unwrap_or(-1), "OCR helper exited with failure status");
        }

        let text = parse_helper_output(&output.stdout, &stderr)?;
        info!(chars = text.len(), "Vision OCR completed");
        debug!(text = %text.chars().take(100).collect::<String>(), "Extracted text preview");
        Ok(text)
    }

    fn command(&self, image_path: &Path) -> Command {
        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.helper);
                command
            }
            None => Command::new(&self.helper),
        };
        command
            .arg(image_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            command.process_group(0);
        }

        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command
    }
}

async fn collect_output(
    child: &mut Child,
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    limit: usize,
) -> Result<RawOutput, OcrError> {
    let wait = async {
        child
            .wait()
            .await
            .map_err(|e| OcrError::unknown(format!("Failed to wait for OCR helper: {e}")))
    };
    let (stdout, stderr, status) = tokio::try_join!(
        read_capped(stdout, limit, "stdout"),
        read_capped(stderr, limit, "stderr"),
        wait
    )?;
    Ok(RawOutput {
        status,
        stdout,
        stderr,
    })
}

async fn read_capped<R>(reader: Option<R>, limit: usize, stream: &str) -> Result<Vec<u8>, OcrError>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };

    let mut buf = Vec::new();
    let mut limited = reader.take(limit as u64 + 1);
    limited
        .read_to_end(&mut buf)
        .await
        .map_err(|e| OcrError::unknown(format!("Failed to read OCR helper {stream}: {e}")))?;

    if buf.len() > limit {
        warn!(stream, limit, "OCR helper output exceeded buffer limit");
        return Err(OcrError::unknown(format!(
            "OCR helper {stream} exceeded the {limit} byte output limit"
        )));
    }
    Ok(buf)
}

/// Kills the helper and everything it forked. `kill_on_drop` alone only reaches the
/// direct child, so an abandoned future can still leave grandchildren behind.
async fn kill_and_reap(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // the helper leads its own process group
            unsafe {
                libc::killpg(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }
    // kill() also waits, so the process is reaped once this returns
    if let Err(e) = child.kill().await {
        debug!(error = %e, "OCR helper already exited");
    }
}

fn parse_helper_output(stdout: &[u8], stderr: &str) -> Result<String, OcrError> {
    let stdout = String::from_utf8_lossy(stdout);
    let trimmed = stdout.trim();

    if trimmed.is_empty() {
        // The stock helper reports its own failures as JSON on stderr
        let reported = stderr
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str::<HelperOutput>(line.trim()).ok())
            .filter(|out| !out.success)
            .and_then(|out| out.error)
            .filter(|e| !e.trim().is_empty());
        let message = reported.unwrap_or_else(|| {
            "No output from OCR helper. The helper might have failed silently.".to_string()
        });
        let err = OcrError::unknown(message);
        return Err(if stderr.trim().is_empty() {
            err
        } else {
            err.with_details(json!({ "stderr": preview(stderr.trim(), 500) }))
        });
    }

    let result: HelperOutput = serde_json::from_str(trimmed).map_err(|e| {
        OcrError::unknown("Failed to parse OCR result. The helper output might be malformed.")
            .with_details(json!({
                "parse_error": e.to_string(),
                "output": preview(trimmed, 200),
            }))
    })?;

    if !result.success {
        let message = result
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "Unknown error occurred".to_string());
        return Err(OcrError::unknown(message));
    }

    Ok(result.text.unwrap_or_default().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::ErrorKind;

    #[test]
    fn swift_helpers_get_the_interpreter() {
        let backend = VisionBackend::new(PathBuf::from("/opt/ocr/vision-ocr.swift"));
        assert_eq!(backend.interpreter(), Some(Path::new("swift")));

        let backend = VisionBackend::new(PathBuf::from("/opt/ocr/vision-ocr"));
        assert_eq!(backend.interpreter(), None);
    }

    #[test]
    fn validate_config_checks_helper_exists() {
        let dir = tempfile::tempdir().unwrap();
        let helper = dir.path().join("vision-ocr.swift");
        assert!(!VisionBackend::new(helper.clone()).validate_config());

        std::fs::write(&helper, "print(1)").unwrap();
        assert!(VisionBackend::new(helper).validate_config());
    }

    #[test]
    fn parses_successful_output() {
        let text = parse_helper_output(b"{\"success\":true,\"text\":\"hello\\n\"}\n", "").unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn success_without_text_is_empty_not_an_error() {
        assert_eq!(parse_helper_output(b"{\"success\":true}", "").unwrap(), "");
    }

    #[test]
    fn reported_failure_keeps_the_helper_message() {
        let err = parse_helper_output(b"{\"success\":false,\"error\":\"boom\"}", "").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn empty_stdout_is_a_silent_failure() {
        let err = parse_helper_output(b"  \n", "").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.message.contains("failed silently"));
        assert!(err.details.is_none());
    }

    #[test]
    fn empty_stdout_uses_error_reported_on_stderr() {
        let stderr = "{\"success\":false,\"error\":\"Failed to load image\"}\n";
        let err = parse_helper_output(b"", stderr).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message, "Failed to load image");
        assert!(err.details.is_some());
    }

    #[test]
    fn malformed_stdout_is_unknown() {
        let err = parse_helper_output(b"Compiling vision-ocr.swift...", "").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.message.contains("malformed"));
    }
}
