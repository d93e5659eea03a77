// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The issue record.
//!
//! On the wire the identifier travels as `_id` (the remote service is a
//! document store); `id` is accepted as an alias when decoding. Blank ids are
//! read as "no id".

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::id::IssueId;

/// A single tracked issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Server-issued id, a local placeholder, or `None` before the first save.
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "non_blank_id"
    )]
    pub id: Option<IssueId>,
    /// Required for a save to succeed.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-form status label.
    #[serde(default)]
    pub state: String,
}

fn non_blank_id<'de, D>(deserializer: D) -> std::result::Result<Option<IssueId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| IssueId::new(s).ok()))
}

impl Issue {
    /// Creates a new, never-saved issue.
    pub fn new(title: impl Into<String>) -> Self {
        Issue {
            id: None,
            title: title.into(),
            description: String::new(),
            state: String::new(),
        }
    }

    pub fn with_id(mut self, id: IssueId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Checks the preconditions for saving.
    ///
    /// A title made only of whitespace counts as empty.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::FieldEmpty { field: "title" });
        }
        Ok(())
    }

    /// Returns the id, or an error naming the action that needed it.
    pub fn require_id(&self, action: &'static str) -> Result<&IssueId> {
        self.id.as_ref().ok_or(Error::MissingId { action })
    }

    /// Returns true if the id was issued by the server.
    pub fn has_server_id(&self) -> bool {
        self.id.as_ref().is_some_and(|id| !id.is_placeholder())
    }

    /// Returns true if the record only exists locally.
    pub fn has_placeholder_id(&self) -> bool {
        self.id.as_ref().is_some_and(IssueId::is_placeholder)
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
