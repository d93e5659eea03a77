// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The synchronizer: reconciles local optimistic writes, remote reads and
//! writes, live push updates, and deferred replay of offline changes.
//!
//! Hosts build a [`Synchronizer`], spawn it, and talk to it through the
//! returned [`SyncHandle`]. Readable state is published as [`SyncState`].

mod actor;
mod flush;
pub mod outbox;
mod state;

pub use actor::{SyncHandle, SyncOptions, Synchronizer};
pub use outbox::{Outbox, PendingEntry, PendingOp};
pub use state::{
    DeleteOutcome, FetchOutcome, FetchSource, FlushReport, OpStatus, SaveOutcome, SyncState,
};

#[cfg(test)]
pub(crate) mod test_helpers;
