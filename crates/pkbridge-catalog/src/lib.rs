//! Reference pkbridge backend serving a JSON package catalog.
//!
//! The catalog file lists repositories and package versions together with
//! their installation state. [`CatalogBackend`] answers the query
//! capabilities from it and rewrites it atomically for installs, removals
//! and repository changes, holding the backend lock meanwhile.
//!
//! [`run`] wires configuration, logging, the interrupt watcher and the
//! dispatcher together for the `pkbridge-catalog` binary.

mod app;
pub mod backend;
pub mod catalog;
pub mod fetch;
pub mod filter;

#[cfg(test)]
mod tests;

pub use app::{AppError, run};
pub use backend::CatalogBackend;
pub use catalog::{Catalog, CatalogError, CatalogPackage, CatalogStore, Repository};
pub use fetch::{CopyFetcher, FetchError, Fetcher};
pub use filter::{FilterError, Filters};
