// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::cache::CacheError;
use crate::remote::RemoteError;

/// Classification of a failed operation, as shown to the caller.
///
/// Only [`ErrorKind::Transport`] is ever recovered locally, and only by save
/// and delete (optimistic write) or by the first page fetch (cached snapshot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A local precondition failed. Never retried.
    Validation,
    /// The operation needs connectivity and there is none.
    NotConnected,
    /// The network failed mid-call.
    Transport,
    /// The server answered with a non-network error.
    RemoteRejected,
    /// A newer fetch replaced this one before it finished.
    Superseded,
    /// A page fetch is already running.
    FetchInFlight,
    /// The synchronizer has shut down.
    Closed,
    /// The local cache failed.
    Cache,
    /// Configuration is invalid.
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::Transport => "transport",
            ErrorKind::RemoteRejected => "remote_rejected",
            ErrorKind::Superseded => "superseded",
            ErrorKind::FetchInFlight => "fetch_in_flight",
            ErrorKind::Closed => "closed",
            ErrorKind::Cache => "cache",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All possible errors that can occur in the issync library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not connected to the issue service\n  hint: this operation has no offline fallback")]
    NotConnected,

    #[error("network failure: {0}")]
    Transport(String),

    #[error("{}", rejected_message(*status, message))]
    RemoteRejected {
        status: Option<u16>,
        message: String,
    },

    #[error("superseded by a newer fetch")]
    Superseded,

    #[error("a page fetch is already in flight")]
    FetchInFlight,

    #[error("synchronizer is closed")]
    Closed,

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn rejected_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("rejected by server ({}): {}", status, message),
        None => format!("rejected by server: {}", message),
    }
}

impl Error {
    /// Returns the taxonomy entry for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::Transport(_) => ErrorKind::Transport,
            Error::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            Error::Superseded => ErrorKind::Superseded,
            Error::FetchInFlight => ErrorKind::FetchInFlight,
            Error::Closed => ErrorKind::Closed,
            Error::Cache(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Cache,
            Error::Config(_) => ErrorKind::Config,
        }
    }
}

/// A specialized Result type for issync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<issync_core::Error> for Error {
    fn from(e: issync_core::Error) -> Self {
        match e {
            issync_core::Error::Json(e) => Error::Json(e),
            other => Error::Validation(other.to_string()),
        }
    }
}

impl From<RemoteError> for Error {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Transport(msg) => Error::Transport(msg),
            RemoteError::Rejected { status, message } => Error::RemoteRejected {
                status: Some(status),
                message,
            },
            RemoteError::Decode(msg) => Error::RemoteRejected {
                status: None,
                message: msg,
            },
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
