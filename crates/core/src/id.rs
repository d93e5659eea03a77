// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Issue identifiers.
//!
//! Ids are opaque strings assigned by the remote service. Records created
//! while offline get a placeholder id instead: the reserved [`PLACEHOLDER_PREFIX`]
//! followed by a decimal counter (`local-1`, `local-2`, ...). A placeholder is
//! swapped for the server id once the record has been created remotely.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Reserved prefix marking ids that were never confirmed by the server.
pub const PLACEHOLDER_PREFIX: &str = "local-";

/// Identifier of an issue, either server-issued or a local placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Wraps a server-issued id.
    ///
    /// Rejects blank ids; a blank id would collide with "no id" on the wire.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidId(id));
        }
        Ok(IssueId(id))
    }

    /// Builds the placeholder id for the given counter value.
    pub fn placeholder(seq: u64) -> Self {
        IssueId(format!("{}{}", PLACEHOLDER_PREFIX, seq))
    }

    /// Returns true if this id was assigned locally and not yet confirmed.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder_seq().is_some()
    }

    /// Returns the counter of a placeholder id, or `None` for server ids.
    pub fn placeholder_seq(&self) -> Option<u64> {
        self.0
            .strip_prefix(PLACEHOLDER_PREFIX)
            .and_then(|rest| rest.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IssueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hands out monotonically increasing placeholder ids.
///
/// Seed it with every id already known locally so placeholders issued after a
/// restart never reuse a value still waiting for replay.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderAllocator {
    last: u64,
}

impl PlaceholderAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator that continues after the highest placeholder in `ids`.
    pub fn seeded<'a>(ids: impl IntoIterator<Item = &'a IssueId>) -> Self {
        let mut alloc = Self::new();
        for id in ids {
            alloc.observe(id);
        }
        alloc
    }

    /// Records an existing id so it will not be handed out again.
    pub fn observe(&mut self, id: &IssueId) {
        if let Some(seq) = id.placeholder_seq() {
            self.last = self.last.max(seq);
        }
    }

    /// Returns the next unused placeholder id.
    pub fn next_id(&mut self) -> IssueId {
        self.last = self.last.saturating_add(1);
        IssueId::placeholder(self.last)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
