#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Detection ingestion pipeline and road health scoring.
//!
//! The [`detection::DetectionPipeline`] validates an image payload, has the
//! injected [`roadwatch_vision::providers::Classifier`] look at it, and
//! persists qualifying detections through the injected
//! [`roadwatch_store::IssueStore`]. Batches run strictly in order with a
//! fixed pause between items so the external classifier's rate limit is
//! respected. [`health::compute_stats`] grades the currently open issues
//! and [`status::set_status`] moves issues through their lifecycle.
//!
//! Nothing here retries: every failure is surfaced to the caller as a
//! [`PipelineError`] whose variant tells it whether a retry makes sense.

pub mod config;
pub mod detection;
pub mod health;
pub mod progress;
pub mod status;

use roadwatch_image::ImageError;
use roadwatch_issue_models::{Issue, IssueQuery};
use roadwatch_store::{IssueStore, StoreError};
use roadwatch_vision::VisionError;
use thiserror::Error;

/// Errors surfaced by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or missing caller input. Never worth retrying.
    #[error("{message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// The vision classifier failed or returned an unusable reply.
    #[error("AI analysis failed: {0}")]
    Classification(#[from] VisionError),

    /// The issue store could not be read or written.
    #[error("Storage failed: {0}")]
    Persistence(#[from] StoreError),

    /// No issue exists with the given id.
    #[error("Issue not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<ImageError> for PipelineError {
    fn from(err: ImageError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Lists stored issues, newest first, filtered by `query`.
///
/// # Errors
///
/// Returns [`PipelineError::Persistence`] if the store read fails.
pub async fn list_issues(
    store: &dyn IssueStore,
    query: &IssueQuery,
) -> Result<Vec<Issue>, PipelineError> {
    let issues = store.query(query).await?;
    log::debug!("Retrieved {} issues", issues.len());
    Ok(issues)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use roadwatch_image::DecodedImage;
    use roadwatch_issue_models::{
        DetectedKind, DetectionResult, Issue, IssuePatch, IssueQuery, NewIssue,
    };
    use roadwatch_store::{IssueStore, StoreError};
    use roadwatch_vision::VisionError;
    use roadwatch_vision::providers::Classifier;

    /// A tiny valid data URL ("hello" as png).
    pub const IMAGE: &str = "data:image/png;base64,aGVsbG8=";

    pub fn detection(kind: DetectedKind, severity: u8, confidence: f64) -> DetectionResult {
        DetectionResult {
            issue_type: kind,
            severity,
            description: format!("{kind} seen"),
            confidence_score: confidence,
        }
    }

    /// Classifier that replays a fixed script of replies in call order.
    /// `Err` entries become provider failures.
    pub struct ScriptedClassifier {
        replies: Mutex<VecDeque<Result<DetectionResult, String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClassifier {
        pub fn new(replies: Vec<Result<DetectionResult, String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(&self, _image: &DecodedImage) -> Result<DetectionResult, VisionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(DetectionResult::no_issue()));
            reply.map_err(|message| VisionError::Provider { message })
        }
    }

    /// Store whose every call fails.
    pub struct BrokenStore;

    #[async_trait::async_trait]
    impl IssueStore for BrokenStore {
        async fn insert(&self, _issue: NewIssue) -> Result<Issue, StoreError> {
            Err(StoreError::Database("disk full".to_string()))
        }

        async fn query(&self, _query: &IssueQuery) -> Result<Vec<Issue>, StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }

        async fn get_by_id(&self, _id: &str) -> Result<Option<Issue>, StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }

        async fn update(
            &self,
            _id: &str,
            _patch: IssuePatch,
        ) -> Result<Option<Issue>, StoreError> {
            Err(StoreError::Database("connection refused".to_string()))
        }
    }
}
