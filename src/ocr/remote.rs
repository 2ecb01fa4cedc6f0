//! Shared request flow for hosted multimodal OCR.
//!
//! `RemoteBackend` owns everything the OpenAI-style and Gemini-style APIs have in
//! common: credential checks, reading and encoding the image, the HTTP round trip and
//! error classification. A `Provider` supplies the parts that differ: URL, request
//! envelope, auth header and where the text sits in the response.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::prompts::STANDARD_OCR_PROMPT;
use super::{describe_duration, preview, BackendConfig, ErrorKind, OcrError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MIME_TYPE: &str = "image/png";
/// Minimum key length accepted for self-hosted or compatible endpoints.
const CUSTOM_ENDPOINT_MIN_KEY_LEN: usize = 10;
const ERROR_BODY_PREVIEW_CHARS: usize = 500;

/// Base64 image ready to embed in a request.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: &'static str,
}

/// The points where one hosted multimodal API differs from another.
pub trait Provider: Send + Sync {
    type Request<'a>: Serialize
    where
        Self: 'a;
    type Response: DeserializeOwned;

    /// Display name shown to users.
    const NAME: &'static str;
    /// Vendor name used in error messages.
    const VENDOR: &'static str;
    const DEFAULT_ENDPOINT: &'static str;
    const DEFAULT_MODEL: &'static str;
    /// Host of the vendor's own endpoint; keys sent there must have the vendor's shape.
    const OFFICIAL_HOST: &'static str;
    const KEY_PREFIX: &'static str;
    const MIN_OFFICIAL_KEY_LEN: usize;

    fn url(&self, endpoint: &str, model: &str) -> String;

    fn build_request<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
        image: &'a EncodedImage,
    ) -> Self::Request<'a>;

    fn authorize(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder;

    fn extract_text(response: Self::Response) -> Option<String>;

    /// Whether a non-2xx response means the credential was rejected.
    fn is_credential_error(status: StatusCode, message: &str, body: &str) -> bool;

    fn mime_type(extension: &str) -> Option<&'static str> {
        common_mime_type(extension)
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteBackend<P> {
    provider: P,
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl<P: Provider> RemoteBackend<P> {
    /// Applies the provider defaults for any endpoint or model the config leaves unset.
    pub fn new(provider: P, config: &BackendConfig) -> Result<Self, OcrError> {
        let client = Client::builder()
            .build()
            .map_err(|e| OcrError::config(format!("HTTP client: {e}")))?;

        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let endpoint = config
            .api_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(P::DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        let model = config
            .model
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(P::DEFAULT_MODEL)
            .to_string();

        Ok(Self {
            provider,
            client,
            api_key,
            endpoint,
            model,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn name(&self) -> &'static str {
        P::NAME
    }

    /// Checks the key shape only. Keys for the vendor's own endpoint need the vendor
    /// prefix; compatible endpoints accept any reasonably long key.
    pub fn validate_config(&self) -> bool {
        if self.api_key.is_empty() {
            return false;
        }
        if self.endpoint.contains(P::OFFICIAL_HOST) {
            self.api_key.starts_with(P::KEY_PREFIX) && self.api_key.len() >= P::MIN_OFFICIAL_KEY_LEN
        } else {
            self.api_key.len() >= CUSTOM_ENDPOINT_MIN_KEY_LEN
        }
    }

    pub async fn recognize_text(
        &self,
        image_path: &Path,
        custom_prompt: Option<&str>,
    ) -> Result<String, OcrError> {
        if self.api_key.is_empty() {
            return Err(OcrError::config(format!(
                "{} API Key is not configured. Please set it in the snap-ocr config file.",
                P::VENDOR
            )));
        }

        let image = prepare_image::<P>(image_path).await?;
        let prompt = custom_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(STANDARD_OCR_PROMPT);
        let url = self.provider.url(&self.endpoint, &self.model);
        let body = self.provider.build_request(&self.model, prompt, &image);

        debug!(
            backend = P::NAME,
            url = %url,
            model = %self.model,
            mime_type = image.mime_type,
            encoded_bytes = image.data.len(),
            custom_prompt = custom_prompt.is_some(),
            "Sending OCR request"
        );

        let request = self.client.post(&url).timeout(self.timeout).json(&body);
        let response = self
            .provider
            .authorize(request, &self.api_key)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(classify_api_error::<P>(status, &body));
        }

        let parsed: P::Response = serde_json::from_str(&body).map_err(|e| {
            warn!(backend = P::NAME, error = %e, "Failed to parse OCR API response");
            OcrError::unknown(format!("Invalid API response: {e}"))
                .with_details(json!({ "body": preview(&body, ERROR_BODY_PREVIEW_CHARS) }))
        })?;

        let text = P::extract_text(parsed)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OcrError::unknown("No text content in API response"))?;

        info!(backend = P::NAME, chars = text.len(), "OCR completed successfully");
        debug!(text = %text.chars().take(100).collect::<String>(), "Extracted text preview");
        Ok(text)
    }

    fn transport_error(&self, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            warn!(backend = P::NAME, timeout_ms = self.timeout.as_millis() as u64, "OCR request timed out");
            OcrError::timeout(format!(
                "Request timed out after {}",
                describe_duration(self.timeout)
            ))
        } else if e.is_connect() || e.is_request() || e.is_body() {
            warn!(backend = P::NAME, error = %e, "OCR request failed");
            OcrError::network(format!("Network error: {e}"))
        } else {
            warn!(backend = P::NAME, error = %e, "OCR request failed");
            OcrError::unknown(e.to_string())
        }
    }
}

/// Maps a non-2xx response to an error kind. Status decides the kind even when the
/// body is not the provider's JSON error shape.
fn classify_api_error<P: Provider>(status: StatusCode, body: &str) -> OcrError {
    let provider_message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|error| error.message)
        .filter(|m| !m.trim().is_empty());
    let message = provider_message.unwrap_or_else(|| {
        format!(
            "API Error: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
        .trim_end()
        .to_string()
    });

    let (kind, message) = if P::is_credential_error(status, &message, body) {
        (
            ErrorKind::InvalidCredential,
            format!(
                "Invalid API key. Please check your {} API key in settings.",
                P::VENDOR
            ),
        )
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        (
            ErrorKind::QuotaExceeded,
            "API quota exceeded or rate limit reached. Please try again later.".to_string(),
        )
    } else if status.as_u16() >= 500 {
        (
            ErrorKind::Network,
            format!("{} server error. Please try again later.", P::VENDOR),
        )
    } else {
        (ErrorKind::Unknown, message)
    };

    warn!(
        backend = P::NAME,
        status = status.as_u16(),
        kind = %kind,
        "OCR API returned error"
    );
    OcrError::new(kind, message).with_details(json!({
        "status": status.as_u16(),
        "body": preview(body, ERROR_BODY_PREVIEW_CHARS),
    }))
}

async fn prepare_image<P: Provider>(image_path: &Path) -> Result<EncodedImage, OcrError> {
    let bytes = tokio::fs::read(image_path).await.map_err(|e| {
        OcrError::invalid_image(format!("Failed to read image file: {e}"))
    })?;
    if bytes.is_empty() {
        return Err(OcrError::invalid_image(format!(
            "Image file is empty: {}",
            image_path.display()
        )));
    }

    Ok(EncodedImage {
        data: STANDARD.encode(&bytes),
        mime_type: mime_type_for::<P>(image_path),
    })
}

/// MIME type for an image path as understood by provider `P`, `image/png` when unknown.
pub fn mime_type_for<P: Provider>(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .and_then(|ext| P::mime_type(&ext))
        .unwrap_or(DEFAULT_MIME_TYPE)
}

pub(crate) fn common_mime_type(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
