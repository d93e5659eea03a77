// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;

pub use issync::{
    Cache, ConnectivityMonitor, Issue, IssueApi, IssueId, Query, RemoteError, RemoteResult,
    SqliteCache, SyncHandle, SyncOptions, SyncState, Synchronizer,
};
pub use tempfile::TempDir;

/// Issue service kept in memory, with a switch to simulate network loss.
#[derive(Clone, Default)]
pub struct ScriptedApi {
    issues: Arc<Mutex<Vec<Issue>>>,
    next_id: Arc<AtomicU64>,
    down: Arc<AtomicBool>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.issues.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.issues().into_iter().map(|i| i.title).collect()
    }

    fn check(&self) -> RemoteResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".into()));
        }
        Ok(())
    }

    fn position(&self, id: &Option<IssueId>) -> RemoteResult<usize> {
        self.issues
            .lock()
            .unwrap()
            .iter()
            .position(|i| i.id.is_some() && &i.id == id)
            .ok_or(RemoteError::Rejected {
                status: 404,
                message: "not found".into(),
            })
    }
}

impl IssueApi for ScriptedApi {
    fn list<'a>(&'a self, _token: &'a str, query: &'a Query) -> BoxFuture<'a, RemoteResult<Vec<Issue>>> {
        Box::pin(async move {
            self.check()?;
            let skip = (query.page.max(1) as usize - 1) * 20;
            Ok(self
                .issues()
                .into_iter()
                .filter(|i| i.title.contains(&query.filter))
                .skip(skip)
                .take(20)
                .collect())
        })
    }

    fn create<'a>(&'a self, _token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            self.check()?;
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let created = Issue {
                id: Some(IssueId::new(format!("srv-{}", n)).unwrap()),
                ..issue.clone()
            };
            self.issues.lock().unwrap().push(created.clone());
            Ok(created)
        })
    }

    fn update<'a>(&'a self, _token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            self.check()?;
            let idx = self.position(&issue.id)?;
            self.issues.lock().unwrap()[idx] = issue.clone();
            Ok(issue.clone())
        })
    }

    fn delete<'a>(&'a self, _token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            self.check()?;
            let idx = self.position(&issue.id)?;
            Ok(self.issues.lock().unwrap().remove(idx))
        })
    }
}

/// Spawns a synchronizer over `api` and a SQLite cache file in `dir`.
pub async fn spawn_sync(api: &ScriptedApi, dir: &TempDir, monitor: &ConnectivityMonitor) -> SyncHandle {
    let cache = SqliteCache::open(&dir.path().join("cache.db")).unwrap();
    Synchronizer::new(Arc::new(api.clone()), Arc::new(cache), monitor.clone())
        .with_token(Some("token".into()))
        .with_options(SyncOptions {
            refresh_on_reconnect: false,
            retry_initial_delay: Duration::from_secs(600),
            retry_max_delay: Duration::from_secs(600),
            ..SyncOptions::default()
        })
        .spawn()
        .await
}

/// Waits up to five seconds for the published state to satisfy `pred`.
pub async fn wait(handle: &SyncHandle, pred: impl FnMut(&SyncState) -> bool) -> SyncState {
    tokio::time::timeout(Duration::from_secs(5), handle.wait_until(pred))
        .await
        .expect("timed out waiting for state")
        .expect("synchronizer closed")
}

pub fn titles(state: &SyncState) -> Vec<String> {
    state.issues.iter().map(|i| i.title.clone()).collect()
}
