//! Road health scoring over open issues.

use roadwatch_issue_models::{Grade, HealthStats, Issue, IssueQuery, IssueStatus, IssueType};
use roadwatch_store::IssueStore;

use crate::PipelineError;

/// Reads every open issue from `store` and summarizes it.
///
/// Recomputed on every call; nothing is cached.
///
/// # Errors
///
/// Returns [`PipelineError::Persistence`] if the store read fails.
pub async fn compute_stats(store: &dyn IssueStore) -> Result<HealthStats, PipelineError> {
    let open = store
        .query(&IssueQuery::with_status(IssueStatus::Open))
        .await?;

    let stats = summarize(&open);

    log::debug!(
        "Health: {} open issues, avg severity {}, grade {}",
        stats.total_issues,
        stats.avg_severity,
        stats.grade,
    );

    Ok(stats)
}

/// Computes [`HealthStats`] over the `Open` issues in `issues`.
///
/// Issues in any other status are ignored. The grade is taken from the
/// exact mean; only the reported `avg_severity` is rounded to two decimals.
#[must_use]
pub fn summarize(issues: &[Issue]) -> HealthStats {
    let mut stats = HealthStats::default();
    let mut severity_sum = 0_u64;

    for issue in issues.iter().filter(|i| i.status == IssueStatus::Open) {
        stats.total_issues += 1;
        severity_sum += u64::from(issue.severity.value());

        match issue.issue_type {
            IssueType::Pothole => stats.pothole_count += 1,
            IssueType::Trash => stats.trash_count += 1,
            IssueType::BrokenLight => stats.light_count += 1,
        }
    }

    if stats.total_issues == 0 {
        return stats;
    }

    #[allow(clippy::cast_precision_loss)]
    let avg = severity_sum as f64 / stats.total_issues as f64;

    stats.avg_severity = (avg * 100.0).round() / 100.0;
    stats.grade = Grade::from_counts(stats.total_issues, avg);

    stats
}
