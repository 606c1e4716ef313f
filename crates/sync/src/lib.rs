//! Sync orchestration: fans content records out to every eligible site,
//! tracks per-(site, record) status and persists a summary per run.

pub mod config;
pub mod gaps;
pub mod orchestrator;
pub mod report;
pub mod store;

pub use config::SyncConfig;
pub use orchestrator::{Orchestrator, SyncRunError};
pub use store::{MemorySyncStore, PgSyncStore, StoreError, SyncStore};
