use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use yachtsync_sync::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: inner data is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used by the site and status repositories.
    pub pool: yachtsync_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Sync engine shared by every run request.
    pub orchestrator: Arc<Orchestrator>,
    /// Cancelled on shutdown; runs stop between records.
    pub shutdown: CancellationToken,
}
