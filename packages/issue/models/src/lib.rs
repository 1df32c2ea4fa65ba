#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Issue record, detection, and health statistic types.
//!
//! This crate defines the canonical shapes shared across roadwatch: the
//! persisted [`Issue`] record, the transient [`DetectionResult`] produced
//! by the vision classifier, and the derived [`HealthStats`] summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Minimum classifier confidence (exclusive) for a detection to be
/// persisted as an [`Issue`].
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Kind of infrastructure defect a persisted issue describes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueType {
    /// Holes, cracks, or deteriorated road surface
    Pothole,
    /// Overflowing bins, litter piles, scattered garbage
    Trash,
    /// Non-functional or damaged streetlights
    BrokenLight,
}

impl IssueType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Pothole, Self::Trash, Self::BrokenLight]
    }
}

/// Kind reported by the classifier, which may be "no issue".
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DetectedKind {
    /// See [`IssueType::Pothole`]
    Pothole,
    /// See [`IssueType::Trash`]
    Trash,
    /// See [`IssueType::BrokenLight`]
    BrokenLight,
    /// Nothing worth recording was seen
    #[serde(rename = "none")]
    #[strum(serialize = "none")]
    NoIssue,
}

impl DetectedKind {
    /// Maps to the persisted [`IssueType`], or `None` for [`Self::NoIssue`].
    #[must_use]
    pub const fn issue_type(self) -> Option<IssueType> {
        match self {
            Self::Pothole => Some(IssueType::Pothole),
            Self::Trash => Some(IssueType::Trash),
            Self::BrokenLight => Some(IssueType::BrokenLight),
            Self::NoIssue => None,
        }
    }
}

impl From<IssueType> for DetectedKind {
    fn from(value: IssueType) -> Self {
        match value {
            IssueType::Pothole => Self::Pothole,
            IssueType::Trash => Self::Trash,
            IssueType::BrokenLight => Self::BrokenLight,
        }
    }
}

/// Lifecycle status of an issue.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum IssueStatus {
    /// Newly detected, not yet acted on
    Open,
    /// A crew has picked the issue up
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    /// Fixed
    Resolved,
}

impl IssueStatus {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Open, Self::InProgress, Self::Resolved]
    }
}

/// Severity of a persisted issue, from 1 (cosmetic) to 10 (acute hazard).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    /// Lowest valid severity.
    pub const MIN: u8 = 1;
    /// Highest valid severity.
    pub const MAX: u8 = 10;

    /// Creates a severity level from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-10.
    pub const fn from_value(value: u8) -> Result<Self, InvalidSeverityError> {
        if value >= Self::MIN && value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(InvalidSeverityError { value })
        }
    }

    /// Creates a severity level, clamping out-of-range values into 1-10.
    #[must_use]
    pub const fn clamped(value: u8) -> Self {
        if value < Self::MIN {
            Self(Self::MIN)
        } else if value > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(value)
        }
    }

    /// Returns the numeric value of this severity level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Severity {
    type Error = InvalidSeverityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value.0
    }
}

/// Error returned when attempting to create a [`Severity`] from an invalid
/// numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSeverityError {
    /// The invalid severity value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidSeverityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid severity value {}: expected 1-10", self.value)
    }
}

impl std::error::Error for InvalidSeverityError {}

/// A classifier verdict for a single image. Never persisted.
///
/// When `issue_type` is [`DetectedKind::NoIssue`] the remaining fields carry
/// defaults and have no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// What the classifier saw.
    pub issue_type: DetectedKind,
    /// Raw severity, 0 when nothing was detected.
    pub severity: u8,
    /// Free-text description from the classifier.
    pub description: String,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence_score: f64,
}

impl DetectionResult {
    /// Description used when the classifier saw nothing.
    pub const NO_ISSUE_DESCRIPTION: &'static str = "No issue detected";

    /// The "nothing found" verdict with default fields.
    #[must_use]
    pub fn no_issue() -> Self {
        Self {
            issue_type: DetectedKind::NoIssue,
            severity: 0,
            description: Self::NO_ISSUE_DESCRIPTION.to_string(),
            confidence_score: 0.0,
        }
    }

    /// Returns the issue type to persist if this detection names a real
    /// defect with confidence strictly above `threshold`.
    #[must_use]
    pub fn qualifying_type(&self, threshold: f64) -> Option<IssueType> {
        self.issue_type
            .issue_type()
            .filter(|_| self.confidence_score > threshold)
    }
}

/// Payload for creating an issue. The store assigns `id`, `status` and
/// timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIssue {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Defect kind.
    pub issue_type: IssueType,
    /// Severity 1-10.
    pub severity: Severity,
    /// Classifier description.
    pub description: String,
    /// Classifier confidence.
    pub confidence_score: f64,
    /// Uploaded image location. Always `None`; images are not stored.
    pub image_url: Option<String>,
}

impl NewIssue {
    /// Builds an insert payload from a qualifying detection.
    #[must_use]
    pub fn from_detection(
        detection: &DetectionResult,
        issue_type: IssueType,
        lat: f64,
        lng: f64,
    ) -> Self {
        Self {
            lat,
            lng,
            issue_type,
            severity: Severity::clamped(detection.severity),
            description: detection.description.clone(),
            confidence_score: detection.confidence_score,
            image_url: None,
        }
    }
}

/// A persisted infrastructure issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Store-assigned identifier.
    pub id: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Defect kind.
    pub issue_type: IssueType,
    /// Severity 1-10.
    pub severity: Severity,
    /// Classifier description.
    pub description: String,
    /// Classifier confidence in [0.0, 1.0].
    pub confidence_score: f64,
    /// Uploaded image location, if any.
    pub image_url: Option<String>,
    /// Lifecycle status.
    pub status: IssueStatus,
    /// Creation time. Never changes.
    pub created_at: DateTime<Utc>,
    /// Time of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Materializes a freshly inserted record: status `Open` and both
    /// timestamps set to `now`.
    #[must_use]
    pub fn from_new(id: String, new: NewIssue, now: DateTime<Utc>) -> Self {
        Self {
            id,
            lat: new.lat,
            lng: new.lng,
            issue_type: new.issue_type,
            severity: new.severity,
            description: new.description,
            confidence_score: new.confidence_score,
            image_url: new.image_url,
            status: IssueStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Filters for listing issues. Results are ordered newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueQuery {
    /// Only issues with this status.
    pub status: Option<IssueStatus>,
    /// Only issues of this kind.
    pub issue_type: Option<IssueType>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

impl IssueQuery {
    /// Query for every issue with the given status.
    #[must_use]
    pub const fn with_status(status: IssueStatus) -> Self {
        Self {
            status: Some(status),
            issue_type: None,
            limit: None,
        }
    }

    /// Whether `issue` passes the status and kind filters.
    #[must_use]
    pub fn matches(&self, issue: &Issue) -> bool {
        self.status.is_none_or(|s| s == issue.status)
            && self.issue_type.is_none_or(|t| t == issue.issue_type)
    }
}

/// Partial update applied to a stored issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePatch {
    /// New lifecycle status.
    pub status: Option<IssueStatus>,
}

/// Letter grade for overall road health.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Grade {
    /// Few, minor issues
    A,
    /// Manageable
    B,
    /// Needs attention
    C,
    /// Poor
    D,
    /// Failing
    F,
}

impl Grade {
    /// Grades a set of open issues by count and average severity.
    ///
    /// Bands are checked top-down and both bounds of a band must hold.
    #[must_use]
    pub fn from_counts(total_issues: u64, avg_severity: f64) -> Self {
        const BANDS: &[(f64, u64, Grade)] = &[
            (3.0, 5, Grade::A),
            (4.0, 10, Grade::B),
            (5.0, 20, Grade::C),
            (7.0, 30, Grade::D),
        ];

        if total_issues == 0 {
            return Self::A;
        }

        BANDS
            .iter()
            .find(|(max_avg, max_total, _)| avg_severity < *max_avg && total_issues < *max_total)
            .map_or(Self::F, |(_, _, grade)| *grade)
    }
}

/// Aggregate statistics over currently open issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStats {
    /// Number of open issues.
    pub total_issues: u64,
    /// Open potholes.
    pub pothole_count: u64,
    /// Open trash reports.
    pub trash_count: u64,
    /// Open broken streetlights.
    pub light_count: u64,
    /// Mean severity rounded to two decimals, 0 when there are no issues.
    pub avg_severity: f64,
    /// Letter grade.
    pub grade: Grade,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            total_issues: 0,
            pothole_count: 0,
            trash_count: 0,
            light_count: 0,
            avg_severity: 0.0,
            grade: Grade::A,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_display_names() {
        assert_eq!("Open".parse::<IssueStatus>().unwrap(), IssueStatus::Open);
        assert_eq!(
            "In Progress".parse::<IssueStatus>().unwrap(),
            IssueStatus::InProgress
        );
        assert_eq!(
            "Resolved".parse::<IssueStatus>().unwrap(),
            IssueStatus::Resolved
        );
        assert!("Cancelled".parse::<IssueStatus>().is_err());
        assert!("open".parse::<IssueStatus>().is_err());
    }

    #[test]
    fn status_display_matches_parse() {
        for status in IssueStatus::all() {
            assert_eq!(status.to_string().parse::<IssueStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn issue_type_wire_names() {
        assert_eq!(IssueType::BrokenLight.as_ref(), "broken_light");
        assert_eq!(
            serde_json::to_string(&IssueType::Pothole).unwrap(),
            "\"pothole\""
        );
        assert_eq!(
            serde_json::from_str::<DetectedKind>("\"none\"").unwrap(),
            DetectedKind::NoIssue
        );
        assert_eq!("none".parse::<DetectedKind>().unwrap(), DetectedKind::NoIssue);
    }

    #[test]
    fn detected_kind_maps_to_issue_type() {
        for t in IssueType::all() {
            assert_eq!(DetectedKind::from(*t).issue_type(), Some(*t));
        }
        assert_eq!(DetectedKind::NoIssue.issue_type(), None);
    }

    #[test]
    fn severity_bounds() {
        assert!(Severity::from_value(0).is_err());
        assert!(Severity::from_value(11).is_err());
        assert_eq!(Severity::from_value(10).unwrap().value(), 10);
        assert_eq!(Severity::clamped(0).value(), 1);
        assert_eq!(Severity::clamped(42).value(), 10);
        assert!(serde_json::from_str::<Severity>("11").is_err());
    }

    #[test]
    fn qualifying_type_requires_strictly_greater_confidence() {
        let mut detection = DetectionResult {
            issue_type: DetectedKind::Trash,
            severity: 4,
            description: "overflowing bin".to_string(),
            confidence_score: 0.5,
        };
        assert_eq!(detection.qualifying_type(DEFAULT_CONFIDENCE_THRESHOLD), None);

        detection.confidence_score = 0.51;
        assert_eq!(
            detection.qualifying_type(DEFAULT_CONFIDENCE_THRESHOLD),
            Some(IssueType::Trash)
        );

        assert_eq!(
            DetectionResult::no_issue().qualifying_type(DEFAULT_CONFIDENCE_THRESHOLD),
            None
        );
    }

    #[test]
    fn grade_table() {
        assert_eq!(Grade::from_counts(0, 0.0), Grade::A);
        assert_eq!(Grade::from_counts(4, 2.9), Grade::A);
        assert_eq!(Grade::from_counts(5, 2.0), Grade::B);
        assert_eq!(Grade::from_counts(9, 3.9), Grade::B);
        assert_eq!(Grade::from_counts(10, 1.0), Grade::C);
        assert_eq!(Grade::from_counts(19, 4.99), Grade::C);
        assert_eq!(Grade::from_counts(3, 6.5), Grade::D);
        assert_eq!(Grade::from_counts(3, 8.67), Grade::F);
        assert_eq!(Grade::from_counts(30, 1.0), Grade::F);
    }

    #[test]
    fn health_stats_serialize_camel_case() {
        let json = serde_json::to_value(HealthStats::default()).unwrap();
        assert_eq!(json["totalIssues"], 0);
        assert_eq!(json["grade"], "A");
        assert!(json.get("avgSeverity").is_some());
    }

    #[test]
    fn query_matches_filters() {
        let now = Utc::now();
        let issue = Issue::from_new(
            "abc".to_string(),
            NewIssue {
                lat: 22.7,
                lng: 75.8,
                issue_type: IssueType::Pothole,
                severity: Severity::clamped(5),
                description: "crack".to_string(),
                confidence_score: 0.9,
                image_url: None,
            },
            now,
        );

        assert_eq!(issue.status, IssueStatus::Open);
        assert_eq!(issue.created_at, issue.updated_at);
        assert!(IssueQuery::default().matches(&issue));
        assert!(IssueQuery::with_status(IssueStatus::Open).matches(&issue));
        assert!(!IssueQuery::with_status(IssueStatus::Resolved).matches(&issue));
        assert!(
            !IssueQuery {
                issue_type: Some(IssueType::Trash),
                ..IssueQuery::default()
            }
            .matches(&issue)
        );
    }
}
