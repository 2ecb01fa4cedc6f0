//! Google Gemini `generateContent` with inline image data.

use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use super::remote::{common_mime_type, EncodedImage, Provider};

#[derive(Debug, Clone, Copy, Default)]
pub struct Gemini;

#[derive(Serialize)]
pub struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    InlineData { inline_data: InlineData<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl Provider for Gemini {
    type Request<'a> = GenerateContentRequest<'a>;
    type Response = GenerateContentResponse;

    const NAME: &'static str = "Google Gemini Vision";
    const VENDOR: &'static str = "Gemini";
    const DEFAULT_ENDPOINT: &'static str = "https://generativelanguage.googleapis.com/v1beta";
    const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";
    const OFFICIAL_HOST: &'static str = "generativelanguage.googleapis.com";
    const KEY_PREFIX: &'static str = "AIza";
    const MIN_OFFICIAL_KEY_LEN: usize = 31;

    fn url(&self, endpoint: &str, model: &str) -> String {
        format!("{endpoint}/models/{model}:generateContent")
    }

    fn build_request<'a>(
        &'a self,
        _model: &'a str,
        prompt: &'a str,
        image: &'a EncodedImage,
    ) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: [Content {
                parts: [
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type,
                            data: &image.data,
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
        }
    }

    fn authorize(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        request.header("x-goog-api-key", api_key)
    }

    fn extract_text(response: GenerateContentResponse) -> Option<String> {
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
    }

    /// Gemini rejects bad keys with 400 and an `API_KEY_INVALID` reason rather than 401.
    fn is_credential_error(status: StatusCode, message: &str, body: &str) -> bool {
        status == StatusCode::BAD_REQUEST
            && (message.contains("API_KEY")
                || body.contains("API_KEY")
                || message.to_ascii_lowercase().contains("api key"))
    }

    fn mime_type(extension: &str) -> Option<&'static str> {
        match extension {
            "heic" => Some("image/heic"),
            "heif" => Some("image/heif"),
            other => common_mime_type(other),
        }
    }
}
