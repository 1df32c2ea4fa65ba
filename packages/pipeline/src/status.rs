//! Issue lifecycle transitions.

use roadwatch_issue_models::{Issue, IssuePatch, IssueStatus};
use roadwatch_store::IssueStore;

use crate::PipelineError;

/// Parses `new_status` and applies it to issue `id`.
///
/// Any of the three statuses may follow any other, including itself; a
/// repeated status still refreshes `updated_at`.
///
/// # Errors
///
/// * [`PipelineError::Validation`] if `new_status` is not a known status
/// * [`PipelineError::NotFound`] if no issue has this id
/// * [`PipelineError::Persistence`] if the store write fails
pub async fn set_status(
    store: &dyn IssueStore,
    id: &str,
    new_status: &str,
) -> Result<Issue, PipelineError> {
    let status = new_status.parse::<IssueStatus>().map_err(|_| {
        let allowed = IssueStatus::all()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        PipelineError::validation(format!("Status must be one of: {allowed}"))
    })?;

    apply_status(store, id, status).await
}

/// Applies an already-parsed status to issue `id`.
///
/// # Errors
///
/// * [`PipelineError::NotFound`] if no issue has this id
/// * [`PipelineError::Persistence`] if the store write fails
pub async fn apply_status(
    store: &dyn IssueStore,
    id: &str,
    status: IssueStatus,
) -> Result<Issue, PipelineError> {
    let issue = store
        .update(
            id,
            IssuePatch {
                status: Some(status),
            },
        )
        .await?
        .ok_or_else(|| PipelineError::NotFound { id: id.to_string() })?;

    log::info!("Issue {id} is now {status}");

    Ok(issue)
}
