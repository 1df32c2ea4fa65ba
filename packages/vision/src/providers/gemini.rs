//! Google Gemini provider implementation.

use roadwatch_image::DecodedImage;
use roadwatch_issue_models::DetectionResult;
use serde::{Deserialize, Serialize};

use super::{Classifier, MAX_TOKENS, provider_error};
use crate::response::parse_detection;
use crate::{VisionError, prompt};

/// Default Gemini model (higher free-tier limits than the larger models).
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini `generateContent` classifier.
pub struct GeminiClassifier {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClassifier {
    /// Creates a new Gemini classifier.
    #[must_use]
    pub const fn new(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            model,
            client,
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
struct InlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[async_trait::async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, image: &DecodedImage) -> Result<DetectionResult, VisionError> {
        let request = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: prompt::SYSTEM_PROMPT,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![
                    GeminiPart::Text {
                        text: prompt::USER_PROMPT,
                    },
                    GeminiPart::InlineData {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_TOKENS,
            },
        };

        let resp = self
            .client
            .post(format!("{API_BASE}/{}:generateContent", self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        let response: GeminiResponse = serde_json::from_str(&body)?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .ok_or_else(|| VisionError::Provider {
                message: "No candidates in Gemini response".to_string(),
            })?;

        log::debug!("Gemini raw response: {text}");

        parse_detection(&text)
    }
}
