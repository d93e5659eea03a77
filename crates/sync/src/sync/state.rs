// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Observable state and operation outcomes.

use serde::Serialize;

use issync_core::{Issue, IssueId};

use crate::error::{Error, ErrorKind};

/// Progress of the latest operation of one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OpStatus {
    #[default]
    Idle,
    InFlight,
    /// `local` is true when the result came from (or only reached) the cache.
    Succeeded { local: bool },
    Failed { kind: ErrorKind, message: String },
}

impl OpStatus {
    pub fn failed(err: &Error) -> Self {
        OpStatus::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, OpStatus::InFlight)
    }

    /// The failure kind, if the operation failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            OpStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Everything a host can render, published after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub issues: Vec<Issue>,
    pub fetch: OpStatus,
    pub save: OpStatus,
    pub delete: OpStatus,
    pub filter: String,
    pub page: u32,
    /// The connectivity monitor reports the remote as reachable.
    pub online: bool,
    /// A bearer token is set.
    pub authenticated: bool,
    /// Online and authenticated: remote operations are attempted.
    pub ready: bool,
    /// The live channel is connected.
    pub live: bool,
    /// Outbox entries waiting for replay.
    pub pending: usize,
    pub flushing: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState {
            issues: Vec::new(),
            fetch: OpStatus::Idle,
            save: OpStatus::Idle,
            delete: OpStatus::Idle,
            filter: String::new(),
            page: 1,
            online: false,
            authenticated: false,
            ready: false,
            live: false,
            pending: 0,
            flushing: false,
        }
    }
}

impl SyncState {
    pub fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id.as_ref() == Some(id))
    }

    /// Any operation still waiting on the remote.
    pub fn is_busy(&self) -> bool {
        self.fetch.is_in_flight()
            || self.save.is_in_flight()
            || self.delete.is_in_flight()
            || self.flushing
    }
}

/// Where a fetch's records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    Remote,
    /// The remote was unreachable; the cached snapshot was kept.
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    pub source: FetchSource,
    /// Page the snapshot now reflects.
    pub page: u32,
    /// Records received from the remote, or held in the snapshot when served
    /// from the cache.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    /// The record as stored: server response, or the local copy with its
    /// placeholder id.
    pub issue: Issue,
    /// Recorded locally and queued for replay.
    pub local: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub id: IssueId,
    pub local: bool,
}

/// Result of one replay pass over the outbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
