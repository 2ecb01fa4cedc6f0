//! Text recognition backends behind one contract.
//!
//! `OcrBackendImpl` wraps the on-device Vision helper and the two hosted multimodal
//! APIs. Callers build one per recognition request from a `BackendConfig` and only
//! ever see plain text or a classified `OcrError`.

mod error;
mod gemini;
mod openai;
pub mod prompts;
mod remote;
mod vision;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::paths;

pub use error::{ErrorKind, OcrError};
pub use gemini::Gemini;
pub use openai::OpenAi;
pub use remote::{mime_type_for, Provider, RemoteBackend};
pub use vision::VisionBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Vision,
    OpenAi,
    Gemini,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }
}

impl FromStr for BackendKind {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vision" => Ok(Self::Vision),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(OcrError::config(format!("Unknown backend type: {other}"))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image detail hint for OpenAI-style providers. Higher detail costs more but reads small text better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    Low,
    Auto,
    #[default]
    High,
}

impl Detail {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "auto" => Some(Self::Auto),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Auto => "auto",
            Self::High => "high",
        }
    }
}

/// Everything needed to build one backend. Supplied by `config`, never mutated here.
#[derive(Clone, Default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub model: Option<String>,
    pub detail: Option<Detail>,
    /// Local helper program; only used by the Vision backend.
    pub helper_path: Option<PathBuf>,
    /// Interpreter for `.swift` helpers; only used by the Vision backend.
    pub swift_bin: Option<PathBuf>,
}

impl BackendConfig {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_endpoint", &self.api_endpoint)
            .field("model", &self.model)
            .field("detail", &self.detail)
            .field("helper_path", &self.helper_path)
            .field("swift_bin", &self.swift_bin)
            .finish()
    }
}

pub enum OcrBackendImpl {
    Vision(VisionBackend),
    OpenAi(RemoteBackend<OpenAi>),
    Gemini(RemoteBackend<Gemini>),
}

impl OcrBackendImpl {
    /// Builds the backend named by `config.kind`. No file, process or network access.
    pub fn create(config: &BackendConfig) -> Result<Self, OcrError> {
        match config.kind {
            BackendKind::Vision => {
                let helper = config
                    .helper_path
                    .clone()
                    .unwrap_or_else(paths::installed_vision_helper);
                let mut backend = VisionBackend::new(helper);
                if let Some(swift_bin) = &config.swift_bin {
                    if backend.interpreter().is_some() {
                        backend = backend.with_interpreter(Some(swift_bin.clone()));
                    }
                }
                Ok(Self::Vision(backend))
            }
            BackendKind::OpenAi => {
                let provider = OpenAi::new(config.detail.unwrap_or_default());
                RemoteBackend::new(provider, config).map(Self::OpenAi)
            }
            BackendKind::Gemini => RemoteBackend::new(Gemini, config).map(Self::Gemini),
        }
    }

    /// Recognizes the text in the image at `image_path`.
    ///
    /// `custom_prompt` replaces the default instruction for the hosted models and is
    /// ignored by the Vision helper.
    pub async fn recognize_text(
        &self,
        image_path: &Path,
        custom_prompt: Option<&str>,
    ) -> Result<String, OcrError> {
        match self {
            Self::Vision(b) => b.recognize_text(image_path, custom_prompt).await,
            Self::OpenAi(b) => b.recognize_text(image_path, custom_prompt).await,
            Self::Gemini(b) => b.recognize_text(image_path, custom_prompt).await,
        }
    }

    /// Local syntactic check of the backend's configuration. Never touches the network.
    pub fn validate_config(&self) -> bool {
        match self {
            Self::Vision(b) => b.validate_config(),
            Self::OpenAi(b) => b.validate_config(),
            Self::Gemini(b) => b.validate_config(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Vision(b) => b.name(),
            Self::OpenAi(b) => b.name(),
            Self::Gemini(b) => b.name(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Vision(_) => BackendKind::Vision,
            Self::OpenAi(_) => BackendKind::OpenAi,
            Self::Gemini(_) => BackendKind::Gemini,
        }
    }
}

/// Human-readable duration for timeout messages.
pub(crate) fn describe_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 && duration.subsec_millis() == 0 {
        format!("{} seconds", duration.as_secs())
    } else {
        format!("{} ms", duration.as_millis())
    }
}

/// First `max_chars` characters of `text`, with "..." when cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_known_names() {
        assert_eq!("vision".parse::<BackendKind>().unwrap(), BackendKind::Vision);
        assert_eq!(" OpenAI ".parse::<BackendKind>().unwrap(), BackendKind::OpenAi);
        assert_eq!("gemini".parse::<BackendKind>().unwrap(), BackendKind::Gemini);
    }

    #[test]
    fn unknown_backend_kind_is_a_config_error() {
        let err = "tesseract".parse::<BackendKind>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert_eq!(err.message, "Unknown backend type: tesseract");
    }

    #[test]
    fn detail_round_trips_through_strings() {
        for detail in [Detail::Low, Detail::Auto, Detail::High] {
            assert_eq!(Detail::from_str(detail.as_str()), Some(detail));
        }
        assert_eq!(Detail::from_str("ultra"), None);
        assert_eq!(Detail::default(), Detail::High);
    }

    #[test]
    fn preview_cuts_on_char_boundaries() {
        assert_eq!(preview("short", 100), "short");
        let long = "字".repeat(120);
        let shown = preview(&long, 100);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 103);
    }

    #[test]
    fn factory_builds_the_requested_backend() {
        for kind in [BackendKind::Vision, BackendKind::OpenAi, BackendKind::Gemini] {
            let backend = OcrBackendImpl::create(&BackendConfig::new(kind)).unwrap();
            assert_eq!(backend.kind(), kind);
        }
    }

    #[test]
    fn names_are_stable_per_kind() {
        let expected = [
            (BackendKind::Vision, "macOS Vision API"),
            (BackendKind::OpenAi, "OpenAI Vision"),
            (BackendKind::Gemini, "Google Gemini Vision"),
        ];
        for (kind, name) in expected {
            let backend = OcrBackendImpl::create(&BackendConfig::new(kind)).unwrap();
            assert_eq!(backend.name(), name);
            assert_eq!(backend.name(), backend.name());
        }
    }

    #[test]
    fn validate_config_rejects_missing_credentials_and_helper() {
        let mut vision = BackendConfig::new(BackendKind::Vision);
        vision.helper_path = Some(PathBuf::from("/nonexistent/snap-ocr/vision-ocr.swift"));
        assert!(!OcrBackendImpl::create(&vision).unwrap().validate_config());

        for kind in [BackendKind::OpenAi, BackendKind::Gemini] {
            let mut config = BackendConfig::new(kind);
            config.api_key = Some(String::new());
            assert!(!OcrBackendImpl::create(&config).unwrap().validate_config());
        }
    }

    #[test]
    fn swift_bin_only_applies_to_swift_helpers() {
        let mut config = BackendConfig::new(BackendKind::Vision);
        config.helper_path = Some(PathBuf::from("/opt/ocr/vision-ocr.swift"));
        config.swift_bin = Some(PathBuf::from("/usr/local/bin/swift"));
        let OcrBackendImpl::Vision(backend) = OcrBackendImpl::create(&config).unwrap() else {
            panic!("expected vision backend");
        };
        assert_eq!(backend.interpreter(), Some(Path::new("/usr/local/bin/swift")));

        config.helper_path = Some(PathBuf::from("/opt/ocr/vision-ocr"));
        let OcrBackendImpl::Vision(backend) = OcrBackendImpl::create(&config).unwrap() else {
            panic!("expected vision backend");
        };
        assert_eq!(backend.interpreter(), None);
    }

    #[test]
    fn debug_output_redacts_the_api_key() {
        let mut config = BackendConfig::new(BackendKind::OpenAi);
        config.api_key = Some("sk-very-secret-key-123456".to_string());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn durations_are_described_for_messages() {
        assert_eq!(describe_duration(Duration::from_secs(60)), "60 seconds");
        assert_eq!(describe_duration(Duration::from_millis(250)), "250 ms");
    }
}
