//! Shared-secret authentication of the sending side.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use yachtsync_core::secret::keys_match;

use crate::error::ImportError;
use crate::state::ImporterState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried the configured API key, either in
/// `X-API-Key` or as `Authorization: Bearer <key>`.
#[derive(Debug, Clone, Copy)]
pub struct SharedSecret;

impl FromRequestParts<ImporterState> for SharedSecret {
    type Rejection = ImportError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ImporterState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .config
            .api_key
            .as_deref()
            .ok_or(ImportError::NotConfigured)?;

        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .or_else(|| {
                parts
                    .headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
            })
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ImportError::Unauthorized("Missing API key".into()))?;

        if !keys_match(expected, provided) {
            tracing::warn!("Import rejected: invalid API key");
            return Err(ImportError::Unauthorized("Invalid API key".into()));
        }
        Ok(SharedSecret)
    }
}
