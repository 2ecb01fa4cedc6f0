//! OpenAI-style chat completions with an embedded image.
//!
//! Works against the official API and any compatible endpoint (local gateways,
//! third-party hosts) since only the `/chat/completions` shape is relied on.

use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use super::remote::{EncodedImage, Provider};
use super::Detail;

const MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAi {
    detail: Detail,
}

impl OpenAi {
    pub fn new(detail: Detail) -> Self {
        Self { detail }
    }
}

#[derive(Serialize)]
pub struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: [ContentPart<'a>; 2],
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
    detail: Detail,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl Provider for OpenAi {
    type Request<'a> = ChatRequest<'a>;
    type Response = ChatResponse;

    const NAME: &'static str = "OpenAI Vision";
    const VENDOR: &'static str = "OpenAI";
    const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";
    const DEFAULT_MODEL: &'static str = "gpt-4o";
    const OFFICIAL_HOST: &'static str = "api.openai.com";
    const KEY_PREFIX: &'static str = "sk-";
    const MIN_OFFICIAL_KEY_LEN: usize = 21;

    fn url(&self, endpoint: &str, _model: &str) -> String {
        format!("{endpoint}/chat/completions")
    }

    fn build_request<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
        image: &'a EncodedImage,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: [
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", image.mime_type, image.data),
                            detail: self.detail,
                        },
                    },
                ],
            }],
            max_tokens: MAX_TOKENS,
            temperature: 0.0,
        }
    }

    fn authorize(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        request.bearer_auth(api_key)
    }

    fn extract_text(response: ChatResponse) -> Option<String> {
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
    }

    fn is_credential_error(status: StatusCode, _message: &str, _body: &str) -> bool {
        status == StatusCode::UNAUTHORIZED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BackendConfig, BackendKind, ErrorKind, RemoteBackend};
    use serde_json::json;
    use std::path::PathBuf;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> RemoteBackend<OpenAi> {
        let mut config = BackendConfig::new(BackendKind::OpenAi);
        config.api_key = Some("test-api-key".to_string());
        config.api_endpoint = Some(format!("{}/v1", server.uri()));
        config.model = Some("gpt-4o-mini".to_string());
        RemoteBackend::new(OpenAi::new(Detail::Low), &config).unwrap()
    }

    fn image(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("receipt.jpg");
        std::fs::write(&path, b"jpegbytes").unwrap();
        path
    }

    #[test]
    fn request_has_text_then_image_url_parts() {
        let provider = OpenAi::new(Detail::High);
        let image = EncodedImage {
            data: "AAAA".to_string(),
            mime_type: "image/png",
        };
        let request = provider.build_request("gpt-4o", "read it", &image);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "read it" },
                        {
                            "type": "image_url",
                            "image_url": { "url": "data:image/png;base64,AAAA", "detail": "high" }
                        }
                    ]
                }],
                "max_tokens": 2000,
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn extracts_first_choice_content() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Total: 42" } }]
        }))
        .unwrap();
        assert_eq!(OpenAi::extract_text(response).as_deref(), Some("Total: 42"));

        let response: ChatResponse =
            serde_json::from_value(json!({ "choices": [{ "message": { "content": null } }] }))
                .unwrap();
        assert_eq!(OpenAi::extract_text(response), None);
    }

    #[tokio::test]
    async fn recognizes_text_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(body_partial_json(json!({ "model": "gpt-4o-mini", "temperature": 0.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "  Hello, world!\n" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let text = backend(&server)
            .recognize_text(&image(&dir), None)
            .await
            .unwrap();
        assert_eq!(text, "Hello, world!");
    }

    #[tokio::test]
    async fn custom_prompt_replaces_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [{
                    "content": [{ "type": "text", "text": "Only the formula, as LaTeX" }]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "$E = mc^2$" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let text = backend(&server)
            .recognize_text(&image(&dir), Some("Only the formula, as LaTeX"))
            .await
            .unwrap();
        assert_eq!(text, "$E = mc^2$");
    }

    #[tokio::test]
    async fn unauthorized_is_invalid_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = backend(&server)
            .recognize_text(&image(&dir), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidCredential);
        assert!(err.message.contains("OpenAI API key"));
    }

    #[tokio::test]
    async fn rate_limited_is_quota_exceeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": { "message": "Rate limit reached for gpt-4o" }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = backend(&server)
            .recognize_text(&image(&dir), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::QuotaExceeded);
    }

    #[tokio::test]
    async fn empty_content_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "" } }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = backend(&server)
            .recognize_text(&image(&dir), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message, "No text content in API response");
    }

    #[tokio::test]
    async fn missing_choices_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "chatcmpl-1" })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = backend(&server)
            .recognize_text(&image(&dir), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
    }
}
