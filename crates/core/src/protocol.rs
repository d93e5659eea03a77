// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Live-channel messages for client-server communication.
//!
//! The protocol is small:
//! - The client's first message authenticates the connection with its token
//! - The server then pushes one event per externally-originated change
//!
//! Both directions are JSON objects of the form `{"type": ..., "payload": ...}`.

use serde::{Deserialize, Serialize};

use crate::id::IssueId;
use crate::issue::Issue;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticates the connection. Must be the first message sent.
    Authorization {
        /// Bearer token of the current user.
        token: String,
    },
}

impl ClientMessage {
    /// Creates an Authorization message.
    pub fn authorization(token: impl Into<String>) -> Self {
        ClientMessage::Authorization {
            token: token.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Changes pushed by the server.
///
/// Events may arrive in any order and reapplying one is harmless.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum LiveEvent {
    /// An issue was created by another client.
    Created(Issue),
    /// An issue was changed by another client.
    Updated(Issue),
    /// An issue was deleted by another client.
    Deleted(Issue),
}

impl LiveEvent {
    /// Returns the issue carried by the event.
    pub fn issue(&self) -> &Issue {
        match self {
            LiveEvent::Created(issue) | LiveEvent::Updated(issue) | LiveEvent::Deleted(issue) => {
                issue
            }
        }
    }

    /// Returns the id of the affected issue, if the payload has one.
    pub fn id(&self) -> Option<&IssueId> {
        self.issue().id.as_ref()
    }

    /// Returns the event tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            LiveEvent::Created(_) => "created",
            LiveEvent::Updated(_) => "updated",
            LiveEvent::Deleted(_) => "deleted",
        }
    }

    /// Serializes the event to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the event from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
