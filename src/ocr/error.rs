//! Error taxonomy shared by every recognition backend.
//!
//! Each backend maps its own failures (process, HTTP, JSON, filesystem) into one
//! `OcrError` before returning, so callers only ever branch on `ErrorKind`.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    InvalidCredential,
    QuotaExceeded,
    Timeout,
    InvalidImage,
    Config,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::InvalidCredential => "api_key",
            Self::QuotaExceeded => "quota",
            Self::Timeout => "timeout",
            Self::InvalidImage => "invalid_image",
            Self::Config => "config",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified recognition failure.
///
/// `details` carries whatever raw context helps debugging (HTTP status and body
/// preview, helper stderr) and is never shown to the user directly.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OcrError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<Value>,
}

impl OcrError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidImage, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Title and hint to show the user for this failure.
    pub fn user_message(&self) -> (&'static str, String) {
        match self.kind {
            ErrorKind::InvalidCredential => (
                "API Key Error",
                "Please configure a valid API key in the snap-ocr config file".to_string(),
            ),
            ErrorKind::QuotaExceeded => (
                "Quota Exceeded",
                "API quota exhausted or rate limit reached, please try again later".to_string(),
            ),
            ErrorKind::Timeout => (
                "Request Timeout",
                "OCR processing took too long, try using a smaller image".to_string(),
            ),
            ErrorKind::Network => (
                "Network Error",
                "Unable to connect to API service, please check your connection".to_string(),
            ),
            ErrorKind::Config => ("Configuration Error", self.message.clone()),
            ErrorKind::InvalidImage => ("Image Error", self.message.clone()),
            ErrorKind::Unknown => ("Recognition Failed", self.message.clone()),
        }
    }
}
