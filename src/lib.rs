//! Federated Catalog Library
//!
//! Crawls the catalogs published by the participants of a dataspace federation
//! and keeps their contract offers in a local, TTL-evicting cache. Crawlers run
//! concurrently against a shared work queue that a partition manager refills
//! on a fixed schedule.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
