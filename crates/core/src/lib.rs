// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! issync-core: Shared data model for the issync synchronizer
//!
//! This crate provides the issue record, identifier rules, snapshot merge
//! semantics, list queries, and live-channel wire messages used by the
//! `issync` synchronizer and its tests.

pub mod error;
pub mod id;
pub mod issue;
pub mod protocol;
pub mod query;
pub mod snapshot;

pub use error::{Error, Result};
pub use id::{IssueId, PlaceholderAllocator, PLACEHOLDER_PREFIX};
pub use issue::Issue;
pub use protocol::{ClientMessage, LiveEvent};
pub use query::Query;
pub use snapshot::Snapshot;
