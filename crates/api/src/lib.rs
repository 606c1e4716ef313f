//! Operator-facing admin API of the sync engine.
//!
//! Exposes the site registry, per-site status and badges, and the run
//! triggers of [`yachtsync_sync::Orchestrator`] under `/api/v1`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
