#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the roadwatch server.
//!
//! Issue and detection payloads reuse the domain types from
//! `roadwatch_issue_models` as-is, so their JSON field names are
//! `snake_case`. Request bodies keep every field optional so that missing
//! values are reported as validation errors by the pipeline rather than as
//! deserialization failures.

use chrono::{DateTime, Utc};
use roadwatch_issue_models::{DetectionResult, HealthStats, Issue};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// `GET /api/health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Always `true` when the server answers.
    pub healthy: bool,
    /// Crate version.
    pub version: String,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable reason.
    pub error: String,
}

impl ApiError {
    /// Wraps a message.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// `POST /api/detect/analyze` body, also one entry of a batch.
///
/// A non-string `image` reads as absent. Coordinates may be numbers or
/// numeric strings; anything else reads as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Data URL or bare base64 image.
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: Option<String>,
    /// Latitude.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lat: Option<f64>,
    /// Longitude.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lng: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseString {
    Text(String),
    Other(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseRequest {
    Request(AnalyzeRequest),
    Other(IgnoredAny),
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match LooseString::deserialize(deserializer)? {
        LooseString::Text(text) => Some(text),
        LooseString::Other(_) => None,
    })
}

fn lenient_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match LooseNumber::deserialize(deserializer)? {
        LooseNumber::Number(value) => Some(value),
        LooseNumber::Text(text) => text.trim().parse().ok(),
        LooseNumber::Other(_) => None,
    })
}

/// Entries that are not objects become empty requests.
fn lenient_requests<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<AnalyzeRequest>, D::Error> {
    Ok(Vec::<LooseRequest>::deserialize(deserializer)?
        .into_iter()
        .map(|entry| match entry {
            LooseRequest::Request(req) => req,
            LooseRequest::Other(_) => AnalyzeRequest::default(),
        })
        .collect())
}

/// `POST /api/detect/analyze` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Always `true`.
    pub success: bool,
    /// Whether an issue was stored, in words.
    pub message: String,
    /// Normalized classifier output.
    pub detection: DetectionResult,
    /// The stored issue, when one qualified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<Issue>,
}

/// `POST /api/detect/batch` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Items to analyze, in order.
    #[serde(default, deserialize_with = "lenient_requests")]
    pub images: Vec<AnalyzeRequest>,
}

/// Outcome of one batch item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiBatchItemResult {
    /// Position of the item in the request.
    pub index: usize,
    /// Whether the item was analyzed without error.
    pub success: bool,
    /// Classifier output, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionResult>,
    /// Stored issue, when the detection qualified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<Issue>,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the item succeeded without producing an issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /api/detect/batch` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Always `true`; per-item failures are reported in `results`.
    pub success: bool,
    /// One-line summary.
    pub message: String,
    /// One entry per request item, in request order.
    pub results: Vec<ApiBatchItemResult>,
}

/// Query parameters for `GET /api/issues`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueListParams {
    /// Exact status display name, e.g. `In Progress`.
    pub status: Option<String>,
    /// Issue kind, e.g. `broken_light`.
    #[serde(alias = "issueType")]
    pub issue_type: Option<String>,
    /// Maximum number of issues to return.
    pub limit: Option<u32>,
}

/// `GET /api/issues` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueListResponse {
    /// Always `true`.
    pub success: bool,
    /// Number of issues returned.
    pub count: usize,
    /// Matching issues, newest first.
    pub issues: Vec<Issue>,
}

/// `PATCH /api/issues/{id}/status` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    /// New status display name.
    pub status: Option<String>,
}

/// `PATCH /api/issues/{id}/status` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    /// Always `true`.
    pub success: bool,
    /// What happened.
    pub message: String,
    /// The updated issue.
    pub issue: Issue,
}

/// `GET /api/issues/stats/health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatsResponse {
    /// Always `true`.
    pub success: bool,
    /// Road health over open issues.
    pub stats: HealthStats,
}
