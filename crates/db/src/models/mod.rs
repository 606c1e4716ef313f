//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - `Deserialize` create/update DTOs where the admin API writes the table
//! - A fallible conversion into the matching `yachtsync_core` domain type

pub mod field;
pub mod record;
pub mod site;
pub mod sync_status;

use yachtsync_core::error::CoreError;

/// Decode a JSONB column into a domain type, reporting which column failed.
pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    column: &'static str,
    value: serde_json::Value,
) -> Result<T, CoreError> {
    serde_json::from_value(value)
        .map_err(|e| CoreError::Internal(format!("Invalid {column} column: {e}")))
}
