use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::store::StoreError;

/// Request-level failure of the importer.
///
/// Per-language failures inside an import never surface here; they are
/// collected into the import response instead.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Malformed or incomplete payload, rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No shared secret configured, so no caller can authenticate.
    #[error("Importer is not configured")]
    NotConfigured,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ImportResult<T> = Result<T, ImportError>;

impl IntoResponse for ImportError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ImportError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", msg.clone())
            }
            ImportError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR", msg.clone()),
            ImportError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                "Importer API key is not configured".to_string(),
            ),
            ImportError::Store(err) => {
                tracing::error!(error = %err, "Import store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "message": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
