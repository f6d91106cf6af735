//! Storage adapter implementations.
//!
//! - [`SqliteExecutionStorage`] — embedded relational store, the default
//!   production backend
//! - [`InMemoryExecutionStorage`] — process-local store for tests and
//!   storage-disabled deployments

mod memory;
mod sqlite;

pub use memory::InMemoryExecutionStorage;
pub use sqlite::SqliteExecutionStorage;
