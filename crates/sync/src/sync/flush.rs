// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Background replay of the outbox.
//!
//! The task replays a fixed batch one entry at a time and posts each result
//! back to the synchronizer, which alone mutates the snapshot and outbox. A
//! failed entry does not stop the batch.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use issync_core::Issue;

use super::actor::Command;
use super::outbox::{PendingEntry, PendingOp};
use super::state::FlushReport;
use crate::remote::{IssueApi, RemoteResult};

pub(super) fn spawn(
    api: Arc<dyn IssueApi>,
    token: String,
    batch: Vec<PendingEntry>,
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run(api, token, batch, tx, cancel))
}

async fn run(
    api: Arc<dyn IssueApi>,
    token: String,
    batch: Vec<PendingEntry>,
    tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
) {
    let mut report = FlushReport::default();

    for entry in batch {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = replay(api.as_ref(), &token, &entry) => result,
        };

        report.attempted += 1;
        match &result {
            Ok(_) => {
                report.succeeded += 1;
                debug!(id = ?entry.id(), seq = entry.seq, "replayed");
            }
            Err(e) => {
                report.failed += 1;
                warn!(id = ?entry.id(), error = %e, "replay failed, keeping entry");
            }
        }

        if tx.send(Command::Replayed { entry, result }).await.is_err() {
            return;
        }
    }

    let _ = tx.send(Command::FlushFinished { report }).await;
}

async fn replay(api: &dyn IssueApi, token: &str, entry: &PendingEntry) -> RemoteResult<Issue> {
    match &entry.op {
        PendingOp::Upsert { issue } if issue.has_placeholder_id() => {
            let fresh = Issue {
                id: None,
                ..issue.clone()
            };
            api.create(token, &fresh).await
        }
        PendingOp::Upsert { issue } => api.update(token, issue).await,
        PendingOp::Delete { id } => {
            let target = Issue::default().with_id(id.clone());
            match api.delete(token, &target).await {
                // Already gone is what we wanted.
                Err(e) if e.is_not_found() => Ok(target),
                other => other,
            }
        }
    }
}
