// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The collection snapshot and its merge rules.
//!
//! A snapshot is the client's ordered belief about server state. Every record
//! in it has an id and no id appears twice; all mutation goes through the
//! methods below so that invariant holds no matter which source (fetch, save,
//! delete, live event, replay) is merging.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;
use crate::id::IssueId;
use crate::issue::Issue;

/// What [`Snapshot::upsert`] did with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A record with the same id was replaced in place.
    Replaced,
    /// No record had the id; the new one was prepended.
    Inserted,
}

/// Ordered, id-unique collection of issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Issue>", into = "Vec<Issue>")]
pub struct Snapshot {
    issues: Vec<Issue>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from an arbitrary list.
    ///
    /// Records without an id are dropped and repeated ids keep their first
    /// occurrence.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let mut snapshot = Snapshot::new();
        snapshot.replace_all(issues);
        snapshot
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    fn position(&self, id: &IssueId) -> Option<usize> {
        self.issues.iter().position(|it| it.id.as_ref() == Some(id))
    }

    pub fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.position(id).map(|idx| &self.issues[idx])
    }

    pub fn contains(&self, id: &IssueId) -> bool {
        self.position(id).is_some()
    }

    /// Iterates over the ids in snapshot order.
    pub fn ids(&self) -> impl Iterator<Item = &IssueId> {
        self.issues.iter().filter_map(|it| it.id.as_ref())
    }

    /// Iterates over records that only exist locally.
    pub fn placeholders(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|it| it.has_placeholder_id())
    }

    /// Replaces the record with the same id in place, or prepends it.
    pub fn upsert(&mut self, issue: Issue) -> Result<Upsert> {
        let id = issue.require_id("merged")?;
        match self.position(id) {
            Some(idx) => {
                self.issues[idx] = issue;
                Ok(Upsert::Replaced)
            }
            None => {
                self.issues.insert(0, issue);
                Ok(Upsert::Inserted)
            }
        }
    }

    /// Removes exactly the record with `id`. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &IssueId) -> Option<Issue> {
        self.position(id).map(|idx| self.issues.remove(idx))
    }

    /// Replaces the whole collection with a first page of results.
    pub fn replace_all(&mut self, page: Vec<Issue>) {
        let mut seen = HashSet::new();
        self.issues = page
            .into_iter()
            .filter(|it| match &it.id {
                Some(id) => seen.insert(id.clone()),
                None => false,
            })
            .collect();
    }

    /// Appends a later page of results.
    ///
    /// A record whose id is already present replaces the existing entry in
    /// place; overlapping pages never duplicate records.
    pub fn append_page(&mut self, page: Vec<Issue>) {
        for issue in page {
            let Some(id) = issue.id.clone() else {
                continue;
            };
            match self.position(&id) {
                Some(idx) => self.issues[idx] = issue,
                None => self.issues.push(issue),
            }
        }
    }

    /// Moves the record at `from` to the id `to`.
    ///
    /// If a record with `to` is already present (a live event can beat the
    /// replay result), the `from` record is dropped instead. Returns false
    /// when `from` is unknown.
    pub fn rename(&mut self, from: &IssueId, to: &IssueId) -> bool {
        let Some(idx) = self.position(from) else {
            return false;
        };
        if self.contains(to) {
            self.issues.remove(idx);
        } else {
            self.issues[idx].id = Some(to.clone());
        }
        true
    }
}

impl From<Vec<Issue>> for Snapshot {
    fn from(issues: Vec<Issue>) -> Self {
        Snapshot::from_issues(issues)
    }
}

impl From<Snapshot> for Vec<Issue> {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.issues
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
