use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ImporterConfig;
use crate::importer::Importer;

/// Shared state of the importer's handlers.
#[derive(Clone)]
pub struct ImporterState {
    pub importer: Importer,
    pub config: Arc<ImporterConfig>,
    /// Database pool when the PostgreSQL store is in use.
    pub pool: Option<PgPool>,
}
