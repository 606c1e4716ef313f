pub mod health;
pub mod records;
pub mod sync;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /sync/sites                          list with badges, create
/// /sync/sites/{id}                     update
/// /sync/sites/{id}/restrictions        replace brand restrictions (PUT)
/// /sync/sites/{id}/statuses            per-record statuses
/// /sync/sites/{id}/run                 run one site (POST)
/// /sync/run                            run every active site (POST)
/// /sync/badge                          aggregate pending indicator
///
/// /records/{id}/mark-pending           dirty bit for every site (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/sync", sync::router())
        .nest("/records", records::router())
}
