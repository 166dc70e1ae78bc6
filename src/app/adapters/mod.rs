//! Built-in protocol adapters

pub mod file;

pub use file::FileCatalogAdapter;
