// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Outbox of mutations waiting for replay.
//!
//! Every save or delete accepted without the server's confirmation is
//! recorded here and persisted with the snapshot. The background flush task
//! replays the entries once the remote is reachable again.
//!
//! The outbox holds at most one entry per issue id. A newer mutation of the
//! same issue replaces the older entry and gets a fresh `seq`; a replay
//! result only clears an entry whose `seq` still matches, so an edit made
//! while its predecessor was being replayed is not lost.
//!
//! Once a placeholder has been created remotely, the outbox remembers which
//! server id it became. A caller still holding the record under its old
//! placeholder id is then routed to the server record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use issync_core::{Issue, IssueId, Result};

/// A mutation to replay against the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PendingOp {
    /// Create (placeholder id) or update (server id) the issue.
    Upsert { issue: Issue },
    /// Delete the issue with this server id.
    Delete { id: IssueId },
}

/// One outbox entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Bumped on every change to the entry.
    pub seq: u64,
    pub op: PendingOp,
}

impl PendingEntry {
    /// The id of the issue this entry mutates.
    pub fn id(&self) -> Option<&IssueId> {
        match &self.op {
            PendingOp::Upsert { issue } => issue.id.as_ref(),
            PendingOp::Delete { id } => Some(id),
        }
    }

    /// True for the upsert of a record the server has never seen.
    pub fn is_create(&self) -> bool {
        matches!(&self.op, PendingOp::Upsert { issue } if issue.has_placeholder_id())
    }
}

/// Ordered, id-unique list of pending mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbox {
    #[serde(default)]
    last_seq: u64,
    #[serde(default)]
    entries: Vec<PendingEntry>,
    /// Placeholder id to the server id it was created as.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    renamed: BTreeMap<IssueId, IssueId>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[PendingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the ids with a pending mutation.
    pub fn ids(&self) -> impl Iterator<Item = &IssueId> {
        self.entries.iter().filter_map(PendingEntry::id)
    }

    fn position(&self, id: &IssueId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == Some(id))
    }

    pub fn entry(&self, id: &IssueId) -> Option<&PendingEntry> {
        self.position(id).map(|idx| &self.entries[idx])
    }

    /// Server id a placeholder was created as, if it has been.
    pub fn resolve(&self, id: &IssueId) -> Option<&IssueId> {
        self.renamed.get(id)
    }

    /// Placeholders already created remotely.
    pub fn renamed_ids(&self) -> impl Iterator<Item = &IssueId> {
        self.renamed.keys()
    }

    fn next_seq(&mut self) -> u64 {
        self.last_seq = self.last_seq.saturating_add(1);
        self.last_seq
    }

    fn put(&mut self, id: &IssueId, op: PendingOp) -> u64 {
        let seq = self.next_seq();
        let entry = PendingEntry { seq, op };
        match self.position(id) {
            Some(idx) => self.entries[idx] = entry,
            None => self.entries.push(entry),
        }
        seq
    }

    /// Records a save. The issue must already carry an id (real or placeholder).
    pub fn record_upsert(&mut self, issue: Issue) -> Result<u64> {
        let id = issue.require_id("queued")?.clone();
        Ok(self.put(&id, PendingOp::Upsert { issue }))
    }

    /// Records a delete.
    ///
    /// Deleting a placeholder only drops its entry: the server never saw the
    /// record. Returns the new entry's `seq`, or `None` when nothing needs
    /// replaying.
    pub fn record_delete(&mut self, id: IssueId) -> Option<u64> {
        if id.is_placeholder() {
            self.discard(&id);
            return None;
        }
        Some(self.put(&id.clone(), PendingOp::Delete { id }))
    }

    /// Removes the entry for `id` regardless of its `seq`.
    pub fn discard(&mut self, id: &IssueId) -> Option<PendingEntry> {
        self.position(id).map(|idx| self.entries.remove(idx))
    }

    /// Removes the entry for `id` if it is still the one with `seq`.
    ///
    /// Returns false if the entry changed (or vanished) since it was replayed.
    pub fn complete(&mut self, id: &IssueId, seq: u64) -> bool {
        match self.position(id) {
            Some(idx) if self.entries[idx].seq == seq => {
                self.entries.remove(idx);
                true
            }
            _ => false,
        }
    }

    /// Records that placeholder `from` was created as `to` and rewrites its
    /// entry, if any, to target the server id.
    ///
    /// The entry keeps its `seq`; a pending upsert becomes an update.
    pub fn rename(&mut self, from: &IssueId, to: &IssueId) -> bool {
        if from.is_placeholder() {
            self.renamed.insert(from.clone(), to.clone());
        }
        let Some(idx) = self.position(from) else {
            return false;
        };
        match &mut self.entries[idx].op {
            PendingOp::Upsert { issue } => issue.id = Some(to.clone()),
            PendingOp::Delete { id } => *id = to.clone(),
        }
        true
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
