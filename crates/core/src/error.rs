// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for issync-core operations.

use thiserror::Error;

/// All possible errors that can occur in issync-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{field} cannot be empty")]
    FieldEmpty { field: &'static str },

    #[error("issue has no id\n  hint: only issues that were saved at least once can be {action}")]
    MissingId { action: &'static str },

    #[error("invalid issue id: '{0}'")]
    InvalidId(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for issync-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
