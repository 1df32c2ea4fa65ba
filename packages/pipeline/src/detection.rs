//! Image analysis: validate, classify, and persist qualifying detections.

use std::sync::Arc;

use roadwatch_issue_models::{DetectionResult, Issue, NewIssue};
use roadwatch_store::IssueStore;
use roadwatch_vision::providers::Classifier;

use crate::PipelineError;
use crate::config::PipelineConfig;
use crate::progress::ProgressCallback;

/// Result of analyzing a single image.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    /// What the classifier reported, after normalization.
    pub detection: DetectionResult,
    /// The stored issue, present only when the detection qualified.
    pub issue: Option<Issue>,
}

/// One entry of a batch request. Fields are optional so that a missing
/// value becomes a per-item failure instead of rejecting the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchItem {
    /// Image payload (data URL or bare base64).
    pub image: Option<String>,
    /// Latitude.
    pub lat: Option<f64>,
    /// Longitude.
    pub lng: Option<f64>,
}

/// Per-item outcome of a batch, tagged with the item's input position.
#[derive(Debug)]
pub struct BatchItemResult {
    /// Zero-based position of the item in the request.
    pub index: usize,
    /// The item's analysis, or the error that stopped it.
    pub outcome: Result<AnalysisOutcome, PipelineError>,
}

impl BatchItemResult {
    /// Whether the item was analyzed without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The stored issue, if this item produced one.
    #[must_use]
    pub fn issue(&self) -> Option<&Issue> {
        self.outcome.as_ref().ok().and_then(|o| o.issue.as_ref())
    }
}

/// All per-item results of a batch, in input order.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One entry per input item, `results[i].index == i`.
    pub results: Vec<BatchItemResult>,
}

impl BatchOutcome {
    /// Number of items processed.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.results.len()
    }

    /// Number of items analyzed without error.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of items that produced a stored issue.
    #[must_use]
    pub fn issues_detected(&self) -> usize {
        self.results.iter().filter(|r| r.issue().is_some()).count()
    }

    /// Human-readable one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Processed {}/{} images, detected {} issues",
            self.success_count(),
            self.processed(),
            self.issues_detected(),
        )
    }
}

/// Turns images into classified, persisted issues.
pub struct DetectionPipeline {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn IssueStore>,
    config: PipelineConfig,
}

impl DetectionPipeline {
    /// Creates a pipeline over the given classifier and store.
    #[must_use]
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn IssueStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            classifier,
            store,
            config,
        }
    }

    /// The store issues are written to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn IssueStore> {
        &self.store
    }

    /// Analyzes one image taken at `(lat, lng)`.
    ///
    /// Validation happens before the classifier is called. An issue is
    /// stored only when the detection names a real issue kind and its
    /// confidence is strictly above the configured threshold.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Validation`] if the image is missing or malformed
    ///   or a coordinate is missing or not finite
    /// * [`PipelineError::Classification`] if the classifier fails
    /// * [`PipelineError::Persistence`] if storing the issue fails
    pub async fn analyze_one(
        &self,
        image: Option<&str>,
        lat: Option<f64>,
        lng: Option<f64>,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let (payload, lat, lng) = validate(image, lat, lng)?;
        let image = roadwatch_image::decode(payload)?;

        log::info!("Analyzing image at coordinates: {lat}, {lng}");

        let detection = self.classifier.classify(&image).await?;

        let Some(issue_type) = detection.qualifying_type(self.config.confidence_threshold) else {
            log::info!(
                "No actionable issue ({}, confidence {:.2})",
                detection.issue_type,
                detection.confidence_score,
            );
            return Ok(AnalysisOutcome {
                detection,
                issue: None,
            });
        };

        let issue = self
            .store
            .insert(NewIssue::from_detection(&detection, issue_type, lat, lng))
            .await?;

        log::info!(
            "Stored {} issue {} (severity {})",
            issue.issue_type,
            issue.id,
            issue.severity.value(),
        );

        Ok(AnalysisOutcome {
            detection,
            issue: Some(issue),
        })
    }

    /// Analyzes a batch of images one after another, in input order.
    ///
    /// A failing item is recorded and does not stop the batch. The
    /// configured delay is applied after every item except the last.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] without doing any work if the
    /// batch is empty or larger than the configured maximum.
    pub async fn analyze_batch(
        &self,
        items: &[BatchItem],
        progress: &dyn ProgressCallback,
    ) -> Result<BatchOutcome, PipelineError> {
        if items.is_empty() {
            return Err(PipelineError::validation("Array of images is required"));
        }

        if items.len() > self.config.max_batch {
            return Err(PipelineError::validation(format!(
                "Maximum {} images allowed per batch",
                self.config.max_batch
            )));
        }

        log::info!("Processing batch of {} images", items.len());

        progress.set_total(items.len() as u64);

        let mut results = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            progress.set_message(format!("image {}/{}", index + 1, items.len()));

            let outcome = self
                .analyze_one(item.image.as_deref(), item.lat, item.lng)
                .await;

            if let Err(e) = &outcome {
                log::warn!("Error processing image {index}: {e}");
            }

            results.push(BatchItemResult { index, outcome });
            progress.inc(1);

            if index + 1 < items.len() && !self.config.inter_item_delay.is_zero() {
                tokio::time::sleep(self.config.inter_item_delay).await;
            }
        }

        let outcome = BatchOutcome { results };

        log::info!("{}", outcome.summary());
        progress.finish(outcome.summary());

        Ok(outcome)
    }
}

fn validate(
    image: Option<&str>,
    lat: Option<f64>,
    lng: Option<f64>,
) -> Result<(&str, f64, f64), PipelineError> {
    let image = image
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PipelineError::validation("Image is required"))?;

    let (Some(lat), Some(lng)) = (lat, lng) else {
        return Err(PipelineError::validation(
            "Location coordinates (lat, lng) are required",
        ));
    };

    if !lat.is_finite() || !lng.is_finite() {
        return Err(PipelineError::validation(
            "Location coordinates must be finite numbers",
        ));
    }

    if !roadwatch_image::is_valid(image) {
        return Err(PipelineError::validation("Invalid base64 image format"));
    }

    Ok((image, lat, lng))
}
