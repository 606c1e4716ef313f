pub mod records;
pub mod runs;
pub mod sites;
