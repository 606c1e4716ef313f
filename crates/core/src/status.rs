//! Per-site sync status, run reports and badge aggregation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::record::ContentKind;
use crate::types::{DbId, Timestamp};

/// Number of error messages kept in a run summary.
pub const ERROR_PREVIEW_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// SyncState
// ---------------------------------------------------------------------------

/// Status of one (site, record) pair. A missing row counts as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Pending,
    Synced,
    Failed,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown sync status '{other}'"
            ))),
        }
    }

    /// Whether a non-force run dispatches a row in this state.
    pub fn needs_dispatch(&self, force: bool) -> bool {
        force || *self != Self::Synced
    }
}

// ---------------------------------------------------------------------------
// Badge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub synced: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteBadge {
    Error,
    NeedsSync,
    Synced,
}

impl SiteBadge {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::NeedsSync => "Needs Sync",
            Self::Synced => "Synced",
        }
    }
}

impl StatusCounts {
    pub fn badge(&self) -> SiteBadge {
        if self.failed > 0 {
            SiteBadge::Error
        } else if self.pending > 0 {
            SiteBadge::NeedsSync
        } else {
            SiteBadge::Synced
        }
    }
}

/// Aggregate indicator over all active sites.
pub fn has_pending<'a>(counts: impl IntoIterator<Item = &'a StatusCounts>) -> bool {
    counts.into_iter().any(|c| c.pending > 0)
}

// ---------------------------------------------------------------------------
// Run reports
// ---------------------------------------------------------------------------

/// Outcome of one sync run against one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub site_id: DbId,
    pub content_type: ContentKind,
    pub force: bool,
    pub imported: usize,
    /// Records claimed by a concurrent run.
    pub skipped: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl RunReport {
    pub fn new(site_id: DbId, content_type: ContentKind, force: bool) -> Self {
        Self {
            site_id,
            content_type,
            force,
            imported: 0,
            skipped: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            started_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        !self.errors.is_empty() && self.imported > 0
    }

    pub fn record_error(&mut self, label: &str, message: impl std::fmt::Display) {
        self.errors.push(format!("{label}: {message}"));
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(chrono::Utc::now());
    }

    /// The `last_sync_result` blob persisted on the site.
    pub fn to_result_blob(&self) -> serde_json::Value {
        let shown: Vec<&String> = self.errors.iter().take(ERROR_PREVIEW_LIMIT).collect();
        serde_json::json!({
            "success": self.success(),
            "partial": self.is_partial(),
            "content_type": self.content_type,
            "force": self.force,
            "imported": self.imported,
            "skipped": self.skipped,
            "error_count": self.errors.len(),
            "errors": shown,
            "more_errors": self.errors.len().saturating_sub(ERROR_PREVIEW_LIMIT),
            "warnings": self.warnings.iter().take(ERROR_PREVIEW_LIMIT).collect::<Vec<_>>(),
            "started_at": self.started_at,
            "finished_at": self.finished_at,
        })
    }
}

/// One-line summary of error messages: the first `limit` joined with `; `
/// plus a `(+N more)` suffix.
pub fn summarize_errors(errors: &[String], limit: usize) -> String {
    let mut summary = errors
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("; ");
    if errors.len() > limit {
        summary.push_str(&format!(" (+{} more)", errors.len() - limit));
    }
    summary
}
