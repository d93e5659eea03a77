// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for synchronizer tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::watch;

use issync_core::{Issue, IssueId, Query};

use crate::cache::{store, MemoryCache};
use crate::connectivity::ConnectivityMonitor;
use crate::remote::transport::tests::MockServer;
use crate::remote::{IssueApi, LiveConfig, RemoteError, RemoteResult};
use crate::sync::{Outbox, SyncHandle, SyncOptions, SyncState, Synchronizer};

/// A call observed by [`MockApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(Query),
    Create(Issue),
    Update(Issue),
    Delete(IssueId),
}

#[derive(Default)]
struct ApiState {
    issues: Vec<Issue>,
    next_id: u64,
    page_size: usize,
    failure: Option<RemoteError>,
    delays: HashMap<String, Duration>,
    calls: Vec<Call>,
}

/// In-memory issue service.
///
/// Behaves like the real service (server-assigned ids, filtering by title,
/// pagination) and can be told to fail every call or to hold calls until
/// released.
#[derive(Clone)]
pub struct MockApi {
    state: Arc<Mutex<ApiState>>,
    held: Arc<watch::Sender<bool>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        MockApi {
            state: Arc::new(Mutex::new(ApiState {
                page_size: 10,
                ..ApiState::default()
            })),
            held: Arc::new(held),
        }
    }

    /// Seeds the server with issues, keeping their ids.
    pub fn with_issues(self, issues: Vec<Issue>) -> Self {
        self.state.lock().unwrap().issues = issues;
        self
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().unwrap().page_size = page_size;
        self
    }

    /// Every following call fails with `error` (`None` to recover).
    pub fn fail_with(&self, error: Option<RemoteError>) {
        self.state.lock().unwrap().failure = error;
    }

    /// Every following call fails as if the network were down.
    pub fn unreachable(&self) {
        self.fail_with(Some(RemoteError::Transport("connection refused".into())));
    }

    /// List calls for `filter` take `delay` before answering.
    pub fn delay_filter(&self, filter: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(filter.to_string(), delay);
    }

    /// Calls wait until [`MockApi::release`].
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    pub fn release(&self) {
        self.held.send_replace(false);
    }

    /// Adds a record on the server side, as another client would.
    pub fn put(&self, issue: Issue) {
        self.state.lock().unwrap().issues.insert(0, issue);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count()
    }

    /// The server's records.
    pub fn issues(&self) -> Vec<Issue> {
        self.state.lock().unwrap().issues.clone()
    }

    pub fn server_issue(&self, id: &str) -> Option<Issue> {
        self.issues()
            .into_iter()
            .find(|i| i.id.as_ref().map(IssueId::as_str) == Some(id))
    }

    async fn gate(&self, call: Call) -> RemoteResult<()> {
        let delay = match &call {
            Call::List(query) => self.state.lock().unwrap().delays.get(&query.filter).copied(),
            _ => None,
        };
        self.state.lock().unwrap().calls.push(call);

        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.state.lock().unwrap().failure.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn not_found(id: &IssueId) -> RemoteError {
    RemoteError::Rejected {
        status: 404,
        message: format!("issue {} not found", id),
    }
}

impl IssueApi for MockApi {
    fn list<'a>(&'a self, _token: &'a str, query: &'a Query) -> BoxFuture<'a, RemoteResult<Vec<Issue>>> {
        Box::pin(async move {
            self.gate(Call::List(query.clone())).await?;
            let state = self.state.lock().unwrap();
            let skip = (query.page.max(1) as usize - 1) * state.page_size;
            Ok(state
                .issues
                .iter()
                .filter(|i| i.title.contains(&query.filter))
                .skip(skip)
                .take(state.page_size)
                .cloned()
                .collect())
        })
    }

    fn create<'a>(&'a self, _token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            self.gate(Call::Create(issue.clone())).await?;
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let created = Issue {
                id: Some(IssueId::new(format!("srv-{}", state.next_id)).unwrap()),
                ..issue.clone()
            };
            state.issues.insert(0, created.clone());
            Ok(created)
        })
    }

    fn update<'a>(&'a self, _token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            self.gate(Call::Update(issue.clone())).await?;
            let id = issue.id.clone().unwrap();
            let mut state = self.state.lock().unwrap();
            let slot = state
                .issues
                .iter_mut()
                .find(|i| i.id.as_ref() == Some(&id))
                .ok_or_else(|| not_found(&id))?;
            *slot = issue.clone();
            Ok(issue.clone())
        })
    }

    fn delete<'a>(&'a self, _token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            let id = issue.id.clone().unwrap();
            self.gate(Call::Delete(id.clone())).await?;
            let mut state = self.state.lock().unwrap();
            let idx = state
                .issues
                .iter()
                .position(|i| i.id.as_ref() == Some(&id))
                .ok_or_else(|| not_found(&id))?;
            Ok(state.issues.remove(idx))
        })
    }
}

pub fn id(s: &str) -> IssueId {
    IssueId::new(s).unwrap()
}

pub fn issue(id_str: &str, title: &str) -> Issue {
    Issue::new(title).with_id(id(id_str))
}

pub fn ids(state: &SyncState) -> Vec<String> {
    state
        .issues
        .iter()
        .map(|i| i.id.as_ref().unwrap().to_string())
        .collect()
}

/// Everything a synchronizer test needs, wired together.
pub struct Harness {
    pub api: MockApi,
    pub cache: MemoryCache,
    pub monitor: ConnectivityMonitor,
    /// The scripted live endpoint.
    pub live: MockServer,
    pub handle: SyncHandle,
}

pub struct HarnessBuilder {
    api: MockApi,
    cache: MemoryCache,
    online: bool,
    token: Option<String>,
    live: MockServer,
    options: SyncOptions,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HarnessBuilder {
    pub fn new() -> Self {
        HarnessBuilder {
            api: MockApi::new(),
            cache: MemoryCache::new(),
            online: true,
            token: Some("token".to_string()),
            live: MockServer::new(),
            options: SyncOptions {
                refresh_on_reconnect: false,
                // Out of reach of a test unless `retry_after` shortens it.
                retry_initial_delay: Duration::from_secs(600),
                retry_max_delay: Duration::from_secs(600),
                ..SyncOptions::default()
            },
        }
    }

    pub fn api(mut self, api: MockApi) -> Self {
        self.api = api;
        self
    }

    pub fn cache(mut self, cache: MemoryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn token(mut self, token: Option<&str>) -> Self {
        self.token = token.map(str::to_string);
        self
    }

    /// Scripts the live channel. Without this it connects and stays idle.
    pub fn live(mut self, server: MockServer) -> Self {
        self.live = server;
        self
    }

    pub fn refresh_on_reconnect(mut self) -> Self {
        self.options.refresh_on_reconnect = true;
        self
    }

    /// Replays work that failed in transit after `delay`.
    pub fn retry_after(mut self, delay: Duration) -> Self {
        self.options.retry_initial_delay = delay;
        self.options.retry_max_delay = delay;
        self
    }

    pub async fn start(self) -> Harness {
        let monitor = ConnectivityMonitor::new(self.online);
        let live_config = LiveConfig {
            url: "ws://mock".into(),
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_secs: 1,
        };
        let sync = Synchronizer::new(
            Arc::new(self.api.clone()),
            Arc::new(self.cache.clone()),
            monitor.clone(),
        )
        .with_token(self.token)
        .with_options(self.options)
        .with_live_channel(live_config, self.live.factory());

        Harness {
            api: self.api,
            cache: self.cache,
            monitor,
            live: self.live,
            handle: sync.spawn().await,
        }
    }
}

impl Harness {
    /// Waits (bounded) until the published state satisfies `pred`.
    pub async fn wait(&self, pred: impl FnMut(&SyncState) -> bool) -> SyncState {
        tokio::time::timeout(Duration::from_secs(5), self.handle.wait_until(pred))
            .await
            .expect("timed out waiting for state")
            .expect("synchronizer closed")
    }

    pub fn state(&self) -> SyncState {
        self.handle.current()
    }

    pub async fn persisted_issues(&self) -> Vec<Issue> {
        store::load_snapshot(&self.cache)
            .await
            .map(|s| s.into_issues())
            .unwrap_or_default()
    }

    pub async fn persisted_outbox(&self) -> Outbox {
        store::load_outbox(&self.cache).await
    }
}
