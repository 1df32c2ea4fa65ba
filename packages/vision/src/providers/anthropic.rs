//! Anthropic Claude provider implementation.

use roadwatch_image::DecodedImage;
use roadwatch_issue_models::DetectionResult;
use serde::{Deserialize, Serialize};

use super::{Classifier, MAX_TOKENS, provider_error};
use crate::response::parse_detection;
use crate::{VisionError, prompt};

/// Default Claude model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Anthropic Messages API classifier.
pub struct AnthropicClassifier {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicClassifier {
    /// Creates a new Anthropic classifier.
    #[must_use]
    pub const fn new(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            model,
            client,
        }
    }
}

/// Anthropic API request body.
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: Vec<AnthropicInput<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicInput<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'a str,
    data: &'a str,
}

/// Anthropic API response body.
#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[async_trait::async_trait]
impl Classifier for AnthropicClassifier {
    async fn classify(&self, image: &DecodedImage) -> Result<DetectionResult, VisionError> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: prompt::SYSTEM_PROMPT,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![
                    AnthropicInput::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type: &image.mime_type,
                            data: &image.base64,
                        },
                    },
                    AnthropicInput::Text {
                        text: prompt::USER_PROMPT,
                    },
                ],
            }],
        };

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        let response: AnthropicResponse = serde_json::from_str(&body)?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        log::debug!("Anthropic raw response: {text}");

        parse_detection(&text)
    }
}
