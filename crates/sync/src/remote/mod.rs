// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Remote collaborators: the REST issue service and its push channel.
//!
//! Both sit behind traits so the synchronizer can be driven by scripted
//! implementations in tests:
//! - [`IssueApi`] for request/response calls
//! - [`Transport`] for the live channel's socket

mod http;
pub mod live;
pub mod transport;

use futures_util::future::BoxFuture;
use issync_core::{Issue, Query};

pub use http::HttpIssueApi;
pub use live::{LiveChannel, LiveConfig, LiveSignal, TransportFactory};
pub use transport::{Transport, TransportError, TransportResult, WebSocketTransport};

/// Error type for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request never got an answer: connect failure, timeout, reset.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server answered but the body was not what we expected.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// True when the failure was the network rather than the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }

    /// True for a 404 answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Rejected { status: 404, .. })
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// The remote issue service.
///
/// Every call carries the bearer token of the current user.
pub trait IssueApi: Send + Sync + 'static {
    /// Lists one page of issues matching the query's filter.
    fn list<'a>(&'a self, token: &'a str, query: &'a Query) -> BoxFuture<'a, RemoteResult<Vec<Issue>>>;

    /// Creates an issue. The server assigns the id.
    fn create<'a>(&'a self, token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>>;

    /// Replaces an existing issue.
    fn update<'a>(&'a self, token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>>;

    /// Deletes an issue, returning the deleted record.
    fn delete<'a>(&'a self, token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>>;
}
