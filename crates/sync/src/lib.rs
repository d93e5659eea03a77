// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! issync: offline-tolerant issue synchronizer.
//!
//! Keeps a local, durable copy of a remote issue collection and reconciles
//! it with the server across intermittent connectivity.
//!
//! # Architecture
//!
//! ```text
//!  intents ─────┐        ┌──────────────┐      ┌──────────────┐
//!  live events ─┼──────► │ Synchronizer │ ───► │  IssueApi    │ (REST)
//!  connectivity ┤ queue  │   (actor)    │ ◄─── │  LiveChannel │ (push)
//!  flush results┘        └──────┬───────┘      └──────────────┘
//!                               │ single writer
//!                               ▼
//!                        ┌──────────────┐
//!                        │    Cache     │ "issues", "outbox"
//!                        └──────────────┘
//! ```
//!
//! - [`connectivity`]: reachability monitor with transition notifications
//! - [`cache`]: durable key/value cache and the persisted layout
//! - [`remote`]: REST client and push channel
//! - [`sync`]: the synchronizer actor, outbox, and background flush task
//! - [`cli`]: the `issync` command-line front end

pub mod cache;
pub mod cli;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod remote;
pub mod sync;

pub use cache::{Cache, MemoryCache, SqliteCache};
pub use config::Config;
pub use connectivity::{ConnectivityMonitor, Probe, TcpProbe};
pub use error::{Error, ErrorKind, Result};
pub use remote::{HttpIssueApi, IssueApi, LiveConfig, RemoteError, RemoteResult};
pub use sync::{
    DeleteOutcome, FetchOutcome, FetchSource, FlushReport, OpStatus, SaveOutcome, SyncHandle,
    SyncOptions, SyncState, Synchronizer,
};

pub use issync_core::{Issue, IssueId, LiveEvent, Query};
