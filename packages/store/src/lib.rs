#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Durable collection of issue records.
//!
//! [`IssueStore`] is the only persistence surface the pipeline sees: insert,
//! filtered query (newest first), lookup by id, and a single-record patch.
//! Two backends are provided:
//!
//! - [`memory::MemoryIssueStore`] keeps records in a `Vec` behind an async
//!   `RwLock`; used by tests and `ROADWATCH_STORE=memory`.
//! - [`sqlite::SqliteIssueStore`] persists to a `SQLite` file through
//!   `switchy_database`.

pub mod memory;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use roadwatch_issue_models::{Issue, IssuePatch, IssueQuery, NewIssue};
use thiserror::Error;

/// Errors from issue storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be converted into an [`Issue`].
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend for issue records.
///
/// Every call is a single independent operation; there are no
/// cross-record transactions.
#[async_trait::async_trait]
pub trait IssueStore: Send + Sync {
    /// Persists a new issue with status `Open`, a fresh id, and
    /// `created_at == updated_at == now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn insert(&self, issue: NewIssue) -> Result<Issue, StoreError>;

    /// Returns issues matching `query`, newest `created_at` first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn query(&self, query: &IssueQuery) -> Result<Vec<Issue>, StoreError>;

    /// Looks up a single issue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get_by_id(&self, id: &str) -> Result<Option<Issue>, StoreError>;

    /// Applies `patch` and refreshes `updated_at`, returning the updated
    /// record, or `None` if `id` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn update(&self, id: &str, patch: IssuePatch) -> Result<Option<Issue>, StoreError>;
}

/// Opens the backend selected by `ROADWATCH_STORE` (`sqlite` or `memory`,
/// default `sqlite`). The `SQLite` file lives at `ROADWATCH_DB_PATH`, or
/// [`sqlite::DEFAULT_DB_PATH`] when unset.
///
/// # Errors
///
/// Returns [`StoreError`] if the `SQLite` database cannot be opened.
pub async fn open_from_env() -> Result<Arc<dyn IssueStore>, StoreError> {
    let backend = std::env::var("ROADWATCH_STORE").unwrap_or_else(|_| "sqlite".to_string());

    match backend.trim().to_ascii_lowercase().as_str() {
        "memory" => {
            log::info!("Using in-memory issue store; issues will not survive a restart");
            Ok(Arc::new(memory::MemoryIssueStore::new()))
        }
        other => {
            if other != "sqlite" {
                log::warn!("Unknown ROADWATCH_STORE={other:?}, falling back to sqlite");
            }
            let path = std::env::var("ROADWATCH_DB_PATH")
                .map_or_else(|_| PathBuf::from(sqlite::DEFAULT_DB_PATH), PathBuf::from);
            Ok(Arc::new(sqlite::SqliteIssueStore::open(&path).await?))
        }
    }
}

/// Generates a new issue identifier.
fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
