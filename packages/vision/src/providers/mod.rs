//! Vision provider abstraction and implementations.
//!
//! Supports Google Gemini, Anthropic Claude, and `OpenAI` via a common
//! trait.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::time::Duration;

use roadwatch_image::DecodedImage;
use roadwatch_issue_models::DetectionResult;

use crate::VisionError;

/// Default per-request timeout for provider HTTP calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum tokens requested for a classification reply.
const MAX_TOKENS: u32 = 1024;

/// Trait for image classifiers.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Classifies a single image for infrastructure defects.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError`] if the provider call fails, times out, or
    /// its reply cannot be parsed.
    async fn classify(&self, image: &DecodedImage) -> Result<DetectionResult, VisionError>;
}

/// Builds the shared HTTP client with the configured request timeout.
///
/// # Errors
///
/// Returns [`VisionError::Http`] if the TLS backend fails to initialise.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, VisionError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Creates a classifier based on environment variables.
///
/// If `VISION_PROVIDER` is explicitly set, uses that provider. Otherwise
/// auto-detects from available credentials:
///
/// 1. `GEMINI_API_KEY` set -> Gemini
/// 2. `ANTHROPIC_API_KEY` set -> Anthropic Claude
/// 3. `OPENAI_API_KEY` set -> `OpenAI`
///
/// `VISION_MODEL` overrides the provider's default model and
/// `VISION_TIMEOUT_SECS` the request timeout.
///
/// # Errors
///
/// Returns [`VisionError::Config`] if no credentials are found or the
/// explicitly requested provider is not configured.
pub fn create_classifier_from_env() -> Result<Box<dyn Classifier>, VisionError> {
    let provider = std::env::var("VISION_PROVIDER").unwrap_or_else(|_| detect_provider());
    let timeout = std::env::var("VISION_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
    let model = std::env::var("VISION_MODEL").ok();

    match provider.to_lowercase().as_str() {
        "gemini" | "google" => {
            let api_key = require_env("GEMINI_API_KEY")?;
            let model = model.unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string());
            Ok(Box::new(gemini::GeminiClassifier::new(
                api_key,
                model,
                http_client(timeout)?,
            )))
        }
        "anthropic" | "claude" => {
            let api_key = require_env("ANTHROPIC_API_KEY")?;
            let model = model.unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string());
            Ok(Box::new(anthropic::AnthropicClassifier::new(
                api_key,
                model,
                http_client(timeout)?,
            )))
        }
        "openai" | "gpt" => {
            let api_key = require_env("OPENAI_API_KEY")?;
            let model = model.unwrap_or_else(|| openai::DEFAULT_MODEL.to_string());
            Ok(Box::new(openai::OpenAiClassifier::new(
                api_key,
                model,
                http_client(timeout)?,
            )))
        }
        other => Err(VisionError::Config {
            message: format!(
                "Unknown vision provider: {other}. Use 'gemini', 'anthropic', or 'openai'."
            ),
        }),
    }
}

fn require_env(name: &str) -> Result<String, VisionError> {
    std::env::var(name).map_err(|_| VisionError::Config {
        message: format!("{name} environment variable not set"),
    })
}

/// Auto-detects which provider to use based on available credentials.
///
/// Returns a provider name string that matches the arms in
/// [`create_classifier_from_env`].
fn detect_provider() -> String {
    for (var, name) in [
        ("GEMINI_API_KEY", "gemini"),
        ("ANTHROPIC_API_KEY", "anthropic"),
        ("OPENAI_API_KEY", "openai"),
    ] {
        if std::env::var(var).is_ok() {
            log::info!("Auto-detected vision provider: {name} ({var} found)");
            return name.to_string();
        }
    }

    log::warn!(
        "No vision credentials detected. Set one of: GEMINI_API_KEY, \
         ANTHROPIC_API_KEY, OPENAI_API_KEY. You can also set VISION_PROVIDER explicitly."
    );

    // Fall back to gemini, which will produce a clear error about the missing key
    "gemini".to_string()
}

/// Turns a non-success HTTP reply into [`VisionError::Provider`], preferring
/// the provider's `{"error": {"message": ...}}` body when present.
fn provider_error(status: reqwest::StatusCode, body: &str) -> VisionError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .map_or_else(|_| format!("HTTP {status}: {body}"), |e| e.error.message);

    VisionError::Provider { message }
}
