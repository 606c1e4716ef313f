//! Operator-key authentication extractor for admin handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use yachtsync_core::error::CoreError;
use yachtsync_core::secret::keys_match;

use crate::error::AppError;
use crate::state::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Proof that the request carried the operator key in `X-Admin-Key`.
///
/// ```ignore
/// async fn my_handler(_operator: RequireOperator) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireOperator;

impl FromRequestParts<AppState> for RequireOperator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin_key.as_deref().ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Admin API key is not configured".into(),
            ))
        })?;

        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing X-Admin-Key header".into()))
            })?;

        if !keys_match(expected, provided) {
            tracing::warn!("Admin request rejected: invalid operator key");
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid operator key".into(),
            )));
        }
        Ok(RequireOperator)
    }
}
