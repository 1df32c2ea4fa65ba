//! In-process issue store.

use chrono::Utc;
use roadwatch_issue_models::{Issue, IssuePatch, IssueQuery, NewIssue};
use tokio::sync::RwLock;

use crate::{IssueStore, StoreError, new_id};

/// Issue store backed by a `Vec` in insertion order.
///
/// The lock is only held for the duration of each call.
#[derive(Default)]
pub struct MemoryIssueStore {
    issues: RwLock<Vec<Issue>>,
}

impl MemoryIssueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored issues.
    pub async fn len(&self) -> usize {
        self.issues.read().await.len()
    }

    /// Whether the store holds no issues.
    pub async fn is_empty(&self) -> bool {
        self.issues.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl IssueStore for MemoryIssueStore {
    async fn insert(&self, issue: NewIssue) -> Result<Issue, StoreError> {
        let issue = Issue::from_new(new_id(), issue, Utc::now());
        self.issues.write().await.push(issue.clone());
        log::debug!("Stored issue {} in memory", issue.id);
        Ok(issue)
    }

    async fn query(&self, query: &IssueQuery) -> Result<Vec<Issue>, StoreError> {
        let issues = self.issues.read().await;

        // Reverse first so that equal timestamps keep newest-inserted first
        // under the stable sort.
        let mut matched: Vec<Issue> = issues
            .iter()
            .rev()
            .filter(|issue| query.matches(issue))
            .cloned()
            .collect();
        drop(issues);

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = query.limit {
            matched.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(matched)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Issue>, StoreError> {
        Ok(self
            .issues
            .read()
            .await
            .iter()
            .find(|issue| issue.id == id)
            .cloned())
    }

    async fn update(&self, id: &str, patch: IssuePatch) -> Result<Option<Issue>, StoreError> {
        let mut issues = self.issues.write().await;

        let Some(issue) = issues.iter_mut().find(|issue| issue.id == id) else {
            return Ok(None);
        };

        if let Some(status) = patch.status {
            issue.status = status;
        }
        issue.updated_at = Utc::now();

        Ok(Some(issue.clone()))
    }
}
