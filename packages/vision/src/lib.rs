#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Vision classifier abstraction for infrastructure defect detection.
//!
//! A [`providers::Classifier`] takes a decoded street photo and returns a
//! [`roadwatch_issue_models::DetectionResult`]. Implementations exist for
//! Google Gemini, Anthropic Claude, and `OpenAI`; the provider is picked
//! from environment variables by [`providers::create_classifier_from_env`].
//! Model replies are free text, so [`response::parse_detection`] digs the
//! first well-formed JSON object out of whatever the model returns.

pub mod prompt;
pub mod providers;
pub mod response;

use thiserror::Error;

/// Errors that can occur while classifying an image.
#[derive(Debug, Error)]
pub enum VisionError {
    /// HTTP request to the vision provider failed (including timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider returned an error response.
    #[error("Provider error: {message}")]
    Provider {
        /// Description of what went wrong.
        message: String,
    },

    /// The model reply contained no usable JSON object.
    #[error("Unable to parse AI response as JSON: {response}")]
    Unparseable {
        /// The raw reply, truncated for display.
        response: String,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}
