//! Issue storage backed by `SQLite`.
//!
//! Uses `switchy_database` for all database operations. Timestamps are
//! stored as fixed-width RFC 3339 strings so that lexical order matches
//! chronological order.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use moosicbox_json_utils::database::ToValue as _;
use roadwatch_issue_models::{
    Issue, IssuePatch, IssueQuery, IssueStatus, IssueType, NewIssue, Severity,
};
use switchy_database::{Database, DatabaseValue};
use switchy_database_connection::init_sqlite_rusqlite;

use crate::{IssueStore, StoreError, new_id};

/// Default path for the issues database.
pub const DEFAULT_DB_PATH: &str = "data/issues.db";

/// Issue store persisted in a `SQLite` file.
pub struct SqliteIssueStore {
    db: Box<dyn Database>,
}

impl SqliteIssueStore {
    /// Opens (or creates) the issues database at `path` and ensures the
    /// schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or schema
    /// creation fails.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db =
            init_sqlite_rusqlite(Some(path)).map_err(|e| StoreError::Database(e.to_string()))?;

        ensure_schema(db.as_ref()).await?;

        log::info!("Opened issue database at {}", path.display());

        Ok(Self { db })
    }
}

/// Creates the `issues` table and its indexes if they don't already exist.
async fn ensure_schema(db: &dyn Database) -> Result<(), StoreError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS issues (
            id               TEXT PRIMARY KEY,
            lat              REAL NOT NULL,
            lng              REAL NOT NULL,
            issue_type       TEXT NOT NULL,
            severity         INTEGER NOT NULL,
            description      TEXT NOT NULL,
            confidence_score REAL NOT NULL,
            image_url        TEXT,
            status           TEXT NOT NULL DEFAULT 'Open',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        )",
    )
    .await
    .map_err(|e| StoreError::Database(e.to_string()))?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_issues_status ON issues (status)")
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_issues_created ON issues (created_at)")
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(())
}

#[async_trait::async_trait]
impl IssueStore for SqliteIssueStore {
    async fn insert(&self, issue: NewIssue) -> Result<Issue, StoreError> {
        // Truncate to the stored precision so the returned record matches a
        // later read.
        let issue = Issue::from_new(new_id(), issue, Utc::now().trunc_subsecs(6));
        let created_at = format_timestamp(issue.created_at);

        self.db
            .exec_raw_params(
                "INSERT INTO issues (id, lat, lng, issue_type, severity, description,
                                     confidence_score, image_url, status, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                &[
                    DatabaseValue::String(issue.id.clone()),
                    DatabaseValue::Real64(issue.lat),
                    DatabaseValue::Real64(issue.lng),
                    DatabaseValue::String(issue.issue_type.to_string()),
                    DatabaseValue::Int32(i32::from(issue.severity.value())),
                    DatabaseValue::String(issue.description.clone()),
                    DatabaseValue::Real64(issue.confidence_score),
                    issue
                        .image_url
                        .clone()
                        .map_or(DatabaseValue::Null, DatabaseValue::String),
                    DatabaseValue::String(issue.status.to_string()),
                    DatabaseValue::String(created_at.clone()),
                    DatabaseValue::String(created_at),
                ],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        log::debug!("Stored issue {}", issue.id);

        Ok(issue)
    }

    async fn query(&self, query: &IssueQuery) -> Result<Vec<Issue>, StoreError> {
        let mut sql = String::from("SELECT * FROM issues");
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(status) = query.status {
            params.push(DatabaseValue::String(status.to_string()));
            conditions.push(format!("status = ${}", params.len()));
        }

        if let Some(issue_type) = query.issue_type {
            params.push(DatabaseValue::String(issue_type.to_string()));
            conditions.push(format!("issue_type = ${}", params.len()));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        if let Some(limit) = query.limit {
            params.push(DatabaseValue::Int64(i64::from(limit)));
            let _ = write!(sql, " LIMIT ${}", params.len());
        }

        let rows = self
            .db
            .query_raw_params(&sql, &params)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(row_to_issue).collect()
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Issue>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT * FROM issues WHERE id = $1",
                &[DatabaseValue::String(id.to_string())],
            )
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.first().map(row_to_issue).transpose()
    }

    async fn update(&self, id: &str, patch: IssuePatch) -> Result<Option<Issue>, StoreError> {
        let now = format_timestamp(Utc::now());

        let (sql, params) = match patch.status {
            Some(status) => (
                "UPDATE issues SET status = $1, updated_at = $2 WHERE id = $3",
                vec![
                    DatabaseValue::String(status.to_string()),
                    DatabaseValue::String(now),
                    DatabaseValue::String(id.to_string()),
                ],
            ),
            None => (
                "UPDATE issues SET updated_at = $1 WHERE id = $2",
                vec![
                    DatabaseValue::String(now),
                    DatabaseValue::String(id.to_string()),
                ],
            ),
        };

        let updated = self
            .db
            .exec_raw_params(sql, &params)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }
}

/// Formats a timestamp with fixed microsecond precision.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Conversion {
            message: format!("invalid {column} timestamp {value:?}: {e}"),
        })
}

/// Converts a database row into an [`Issue`].
fn row_to_issue(row: &switchy_database::Row) -> Result<Issue, StoreError> {
    let issue_type_name: String = row.to_value("issue_type").unwrap_or_default();
    let issue_type = issue_type_name
        .parse::<IssueType>()
        .map_err(|_| StoreError::Conversion {
            message: format!("unknown issue_type {issue_type_name:?}"),
        })?;

    let status_name: String = row.to_value("status").unwrap_or_default();
    let status = status_name
        .parse::<IssueStatus>()
        .map_err(|_| StoreError::Conversion {
            message: format!("unknown status {status_name:?}"),
        })?;

    let severity_val: i32 = row.to_value("severity").unwrap_or(0);
    let severity = u8::try_from(severity_val)
        .ok()
        .and_then(|v| Severity::from_value(v).ok())
        .ok_or_else(|| StoreError::Conversion {
            message: format!("severity {severity_val} out of range"),
        })?;

    let created_at: String = row.to_value("created_at").unwrap_or_default();
    let updated_at: String = row.to_value("updated_at").unwrap_or_default();

    Ok(Issue {
        id: row.to_value("id").unwrap_or_default(),
        lat: row.to_value("lat").unwrap_or(0.0),
        lng: row.to_value("lng").unwrap_or(0.0),
        issue_type,
        severity,
        description: row.to_value("description").unwrap_or_default(),
        confidence_score: row.to_value("confidence_score").unwrap_or(0.0),
        image_url: row.to_value("image_url").unwrap_or(None),
        status,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}
