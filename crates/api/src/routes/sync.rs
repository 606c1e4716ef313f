//! Route definitions for the site registry and sync runs, mounted at `/sync`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{runs, sites};
use crate::state::AppState;

/// ```text
/// GET    /sites                    -> list_sites
/// POST   /sites                    -> create_site
/// PUT    /sites/{id}               -> update_site
/// PUT    /sites/{id}/restrictions  -> replace_restrictions
/// GET    /sites/{id}/statuses      -> list_statuses
/// POST   /sites/{id}/run           -> run_site
/// POST   /run                      -> run_all
/// GET    /badge                    -> badge
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sites", get(sites::list_sites).post(sites::create_site))
        .route("/sites/{id}", put(sites::update_site))
        .route("/sites/{id}/restrictions", put(sites::replace_restrictions))
        .route("/sites/{id}/statuses", get(sites::list_statuses))
        .route("/sites/{id}/run", post(runs::run_site))
        .route("/run", post(runs::run_all))
        .route("/badge", get(runs::badge))
}
