use axum::routing::post;
use axum::Router;

use crate::handlers::records;
use crate::state::AppState;

/// Content record routes mounted at `/records`.
///
/// ```text
/// POST   /{id}/mark-pending        -> mark_pending
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/mark-pending", post(records::mark_pending))
}
