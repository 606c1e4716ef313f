//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod catalog_repo;
pub mod content_record_repo;
pub mod field_config_repo;
pub mod sync_site_repo;
pub mod sync_status_repo;

pub use catalog_repo::CatalogRepo;
pub use content_record_repo::ContentRecordRepo;
pub use field_config_repo::FieldConfigRepo;
pub use sync_site_repo::SyncSiteRepo;
pub use sync_status_repo::SyncStatusRepo;
