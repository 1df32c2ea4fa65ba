//! `OpenAI` GPT provider implementation.

use roadwatch_image::DecodedImage;
use roadwatch_issue_models::DetectionResult;
use serde::{Deserialize, Serialize};

use super::{Classifier, MAX_TOKENS, provider_error};
use crate::response::parse_detection;
use crate::{VisionError, prompt};

/// Default `OpenAI` model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// `OpenAI` chat completions classifier.
pub struct OpenAiClassifier {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClassifier {
    /// Creates a new `OpenAI` classifier.
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
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: OpenAiContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAiContent<'a> {
    Text(&'a str),
    Parts(Vec<OpenAiPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, image: &DecodedImage) -> Result<DetectionResult, VisionError> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: OpenAiContent::Text(prompt::SYSTEM_PROMPT),
                },
                OpenAiMessage {
                    role: "user",
                    content: OpenAiContent::Parts(vec![
                        OpenAiPart::Text {
                            text: prompt::USER_PROMPT.to_string(),
                        },
                        OpenAiPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image.to_data_url(),
                            },
                        },
                    ]),
                },
            ],
            max_tokens: MAX_TOKENS,
        };

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(provider_error(status, &body));
        }

        let response: OpenAiResponse = serde_json::from_str(&body)?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| VisionError::Provider {
                message: "No choices in OpenAI response".to_string(),
            })?;

        log::debug!("OpenAI raw response: {text}");

        parse_detection(&text)
    }
}
