// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable local cache.
//!
//! The cache is a plain string key/value store that survives process
//! restarts. It performs no schema validation; [`store`] owns the layout and
//! treats absent or malformed entries as a miss.

mod memory;
mod sqlite;
pub mod store;

use futures_util::future::BoxFuture;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous writer panicked while holding the connection.
    #[error("cache connection poisoned")]
    Poisoned,

    /// The blocking worker did not complete.
    #[error("cache worker failed: {0}")]
    Worker(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key/value persistence used by the synchronizer.
///
/// All operations are asynchronous; implementations backed by blocking I/O
/// move the work off the async runtime.
pub trait Cache: Send + Sync + 'static {
    /// Returns the value stored under `key`, if any.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<Option<String>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, CacheResult<()>>;

    /// Removes every entry.
    fn clear(&self) -> BoxFuture<'_, CacheResult<()>>;
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod sqlite_tests;

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
