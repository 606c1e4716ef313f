//! Receiving side of the sync engine: the service each storefront runs to
//! accept snapshots and turn them into local, translation-linked posts.

pub mod auth;
pub mod config;
pub mod error;
pub mod importer;
pub mod legacy;
pub mod media;
pub mod payload;
pub mod routes;
pub mod state;
pub mod store;
pub mod taxonomy;
pub mod translation;

pub use importer::{ImportSummary, Importer};
