//! Pure domain types and logic for multi-site content synchronization.
//!
//! Nothing in this crate performs I/O. The database, HTTP and importer
//! crates build on these types:
//!
//! - [`language`]: language codes and language-keyed maps.
//! - [`record`]: content records (yachts, news) as read from the source store.
//! - [`field`]: custom field configuration as a tagged union of field kinds.
//! - [`site`]: target site configuration and brand/model eligibility.
//! - [`snapshot`]: site-specific payload assembly.
//! - [`status`]: per-site sync status aggregation and run reports.
//! - [`error`]: domain and sync error taxonomies.

pub mod error;
pub mod field;
pub mod language;
pub mod media;
pub mod record;
pub mod secret;
pub mod site;
pub mod snapshot;
pub mod status;
pub mod translate;
pub mod types;
