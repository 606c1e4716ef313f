use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure taxonomy shared by the dispatch client, orchestrator and importer.
///
/// Retryability decides whether the dispatch client may try again and
/// whether a failed row is worth re-running without operator action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// DNS, connect, TLS or timeout failure before a response was read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Missing or rejected API key.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Structurally invalid payload (missing slug, title, etc.).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Concurrent creation of the same (source_id, language) pair.
    #[error("Identity conflict for {source_id} ({language})")]
    IdentityConflict { source_id: String, language: String },

    /// Some media URLs could not be downloaded; the record was still saved.
    #[error("Media download failed for {failed} of {total} URL(s)")]
    PartialMedia { failed: usize, total: usize },

    /// A taxonomy term was created without its declared parent.
    #[error("Parent term '{parent}' not found for term '{term}'")]
    TaxonomyParentUnresolved { term: String, parent: String },

    /// The remote side answered with a non-success response.
    #[error("Remote returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },
}

impl SyncError {
    /// Whether re-attempting the same operation can succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::IdentityConflict { .. })
    }

    /// Stable machine-readable code used in result blobs and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Auth(_) => "AUTH_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::IdentityConflict { .. } => "IDENTITY_CONFLICT",
            Self::PartialMedia { .. } => "PARTIAL_MEDIA_FAILURE",
            Self::TaxonomyParentUnresolved { .. } => "TAXONOMY_PARENT_UNRESOLVED",
            Self::Remote { .. } => "REMOTE_ERROR",
        }
    }

    /// Warnings are surfaced to operators but never fail a record.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::PartialMedia { .. } | Self::TaxonomyParentUnresolved { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_and_identity_conflicts_retry() {
        assert!(SyncError::Transport("timeout".into()).is_retryable());
        assert!(SyncError::IdentityConflict {
            source_id: "abc".into(),
            language: "en".into(),
        }
        .is_retryable());
        assert!(!SyncError::Auth("bad key".into()).is_retryable());
        assert!(!SyncError::Validation("missing slug".into()).is_retryable());
        assert!(!SyncError::Remote {
            status: 500,
            message: "boom".into(),
        }
        .is_retryable());
    }

    #[test]
    fn warnings_are_media_and_taxonomy() {
        assert!(SyncError::PartialMedia { failed: 1, total: 3 }.is_warning());
        assert!(SyncError::TaxonomyParentUnresolved {
            term: "b".into(),
            parent: "a".into(),
        }
        .is_warning());
        assert!(!SyncError::Transport("x".into()).is_warning());
    }

    #[test]
    fn display_includes_context() {
        let err = SyncError::Remote {
            status: 422,
            message: "title required".into(),
        };
        assert_eq!(err.to_string(), "Remote returned HTTP 422: title required");
        assert_eq!(err.code(), "REMOTE_ERROR");
    }
}
