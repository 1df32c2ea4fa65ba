//! Pipeline tuning knobs.

use std::time::Duration;

use roadwatch_issue_models::DEFAULT_CONFIDENCE_THRESHOLD;

/// Default maximum number of items accepted in one batch.
pub const DEFAULT_MAX_BATCH: usize = 10;

/// Default pause between consecutive batch items.
pub const DEFAULT_INTER_ITEM_DELAY: Duration = Duration::from_millis(500);

/// Runtime settings for [`crate::detection::DetectionPipeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Batches larger than this are rejected before any work is done.
    pub max_batch: usize,
    /// Fixed pause after each batch item except the last.
    pub inter_item_delay: Duration,
    /// A detection is persisted only when its confidence is strictly
    /// greater than this value.
    pub confidence_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            inter_item_delay: DEFAULT_INTER_ITEM_DELAY,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Reads overrides from `ROADWATCH_MAX_BATCH`,
    /// `ROADWATCH_BATCH_DELAY_MS`, and `ROADWATCH_CONFIDENCE_THRESHOLD`.
    ///
    /// Unset variables keep their defaults. Unparseable values are logged
    /// and ignored; a zero batch size or a threshold outside `[0, 1]` also
    /// falls back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_batch = env_parsed::<usize>("ROADWATCH_MAX_BATCH")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_batch);

        let inter_item_delay = env_parsed::<u64>("ROADWATCH_BATCH_DELAY_MS")
            .map_or(defaults.inter_item_delay, Duration::from_millis);

        let confidence_threshold = env_parsed::<f64>("ROADWATCH_CONFIDENCE_THRESHOLD")
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(defaults.confidence_threshold);

        Self {
            max_batch,
            inter_item_delay,
            confidence_threshold,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    raw.trim().parse().map_or_else(
        |_| {
            log::warn!("Ignoring {name}={raw:?}: not a valid value");
            None
        },
        Some,
    )
}
