//! Persistent configuration handling for snap-ocr.
//!
//! Persists configuration in a JSON file:
//! `~/.config/snap-ocr/config.json`, or the path in `SNAP_OCR_CONFIG`.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::ocr::{BackendConfig, BackendKind, Detail, OcrError};
use crate::paths;

const APP_CONFIG_DIR_NAME: &str = "snap-ocr";
const CONFIG_FILE_NAME: &str = "config.json";
pub const CONFIG_PATH_ENV: &str = "SNAP_OCR_CONFIG";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
const REDACTED: &str = "<redacted>";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No config directory available on this platform")]
    NoConfigDir,
    #[error(transparent)]
    Backend(#[from] OcrError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Some(Self::Error),
            "WARN" | "WARNING" => Some(Self::Warn),
            "INFO" => Some(Self::Info),
            "DEBUG" => Some(Self::Debug),
            "TRACE" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn filter(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// The whole config document. Every field is optional; blanks are dropped on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FullConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_helper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swift_bin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl FullConfig {
    /// Copy safe to print: credentials replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| REDACTED.to_string());
        Self {
            openai_api_key: mask(&self.openai_api_key),
            gemini_api_key: mask(&self.gemini_api_key),
            ..self.clone()
        }
    }

    fn drop_blanks(self) -> Self {
        Self {
            ocr_backend: clean(self.ocr_backend),
            openai_api_key: clean(self.openai_api_key),
            openai_api_endpoint: clean(self.openai_api_endpoint),
            openai_model: clean(self.openai_model),
            openai_detail: clean(self.openai_detail),
            gemini_api_key: clean(self.gemini_api_key),
            gemini_api_endpoint: clean(self.gemini_api_endpoint),
            gemini_model: clean(self.gemini_model),
            vision_helper: clean(self.vision_helper),
            swift_bin: clean(self.swift_bin),
            log_level: clean(self.log_level),
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let path = config_dir()?
        .join(APP_CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);
    Some(path)
}

fn ensure_config_dir_exists(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Reads the config at `path`. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<FullConfig, ConfigError> {
    if !path.exists() {
        debug!(?path, "Config file does not exist, using defaults");
        return Ok(FullConfig::default());
    }

    let data = fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    debug!(?path, "Config loaded");
    Ok(cfg)
}

pub fn save_config_to(path: &Path, cfg: FullConfig) -> Result<(), ConfigError> {
    ensure_config_dir_exists(path)?;
    let data = serde_json::to_string_pretty(&cfg.drop_blanks())?;
    fs::write(path, data)?;
    debug!(?path, "Config saved");
    Ok(())
}

pub fn load_full_config() -> Result<FullConfig, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    load_config_from(&path)
}

pub fn save_full_config(config: FullConfig) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_config_to(&path, config)
}

fn load_or_default_config(path: &Path) -> FullConfig {
    match load_config_from(path) {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = ?err, "Failed to load existing config, starting fresh");
            FullConfig::default()
        }
    }
}

fn update_config(apply: impl FnOnce(&mut FullConfig)) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    let mut cfg = load_or_default_config(&path);
    apply(&mut cfg);
    save_config_to(&path, cfg)
}

/// Builds the config for the backend selected in the config file, or for
/// `kind_override` when given. API keys fall back to `OPENAI_API_KEY` and
/// `GEMINI_API_KEY`. Without a configured helper the bundled Vision script is searched for.
pub fn load_backend_config(
    kind_override: Option<BackendKind>,
) -> Result<BackendConfig, ConfigError> {
    let cfg = load_full_config()?;
    let mut backend = resolve_backend_config(&cfg, kind_override, |name| env::var(name).ok())?;
    if backend.kind == BackendKind::Vision && backend.helper_path.is_none() {
        backend.helper_path = Some(paths::bundled_vision_helper());
    }
    Ok(backend)
}

fn resolve_backend_config(
    cfg: &FullConfig,
    kind_override: Option<BackendKind>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<BackendConfig, ConfigError> {
    let kind = match kind_override {
        Some(kind) => kind,
        None => match clean(cfg.ocr_backend.clone()) {
            Some(name) => name.parse::<BackendKind>()?,
            None => BackendKind::default(),
        },
    };

    let mut backend = BackendConfig::new(kind);
    match kind {
        BackendKind::Vision => {
            backend.helper_path = clean(cfg.vision_helper.clone()).map(|p| expand_home(&p));
            backend.swift_bin = clean(cfg.swift_bin.clone()).map(|p| expand_home(&p));
        }
        BackendKind::OpenAi => {
            backend.api_key = clean(cfg.openai_api_key.clone())
                .or_else(|| clean(env_lookup(OPENAI_API_KEY_ENV)));
            backend.api_endpoint = clean(cfg.openai_api_endpoint.clone());
            backend.model = clean(cfg.openai_model.clone());
            backend.detail = clean(cfg.openai_detail.clone()).and_then(|d| {
                let parsed = Detail::from_str(&d);
                if parsed.is_none() {
                    warn!(detail = %d, "Ignoring unknown openai_detail value");
                }
                parsed
            });
        }
        BackendKind::Gemini => {
            backend.api_key = clean(cfg.gemini_api_key.clone())
                .or_else(|| clean(env_lookup(GEMINI_API_KEY_ENV)));
            backend.api_endpoint = clean(cfg.gemini_api_endpoint.clone());
            backend.model = clean(cfg.gemini_model.clone());
        }
    }

    debug!(config = ?backend, "Resolved backend config");
    Ok(backend)
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = paths::get_home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

pub fn save_ocr_backend(kind: BackendKind) -> Result<(), ConfigError> {
    debug!(backend = %kind, "Saving OCR backend");
    update_config(|cfg| cfg.ocr_backend = Some(kind.as_str().to_string()))
}

/// Read before logging is initialised, so failures go straight to stderr.
pub fn load_log_level() -> LogLevel {
    match load_full_config() {
        Ok(cfg) => cfg
            .log_level
            .as_deref()
            .and_then(LogLevel::from_str)
            .unwrap_or_default(),
        Err(err) => {
            eprintln!("Config: failed to load config, using default log level: {err:?}");
            LogLevel::default()
        }
    }
}

pub fn save_log_level(level: LogLevel) -> Result<(), ConfigError> {
    debug!(?level, "Saving log level");
    update_config(|cfg| cfg.log_level = Some(level.as_str().to_string()))
}
