// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The synchronizer actor.
//!
//! One task owns the snapshot, cursor, statuses, outbox, and placeholder
//! allocator. Host intents, live-channel signals, finished network calls,
//! and flush results all arrive as [`Command`]s on a single queue, so every
//! transition is applied in arrival order by a single writer.
//!
//! Network calls never run on the actor itself: they are spawned and post a
//! completion command back. Cache writes are awaited inline.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use issync_core::{Issue, IssueId, LiveEvent, PlaceholderAllocator, Query, Snapshot};

use super::flush;
use super::outbox::{Outbox, PendingEntry, PendingOp};
use super::state::{
    DeleteOutcome, FetchOutcome, FetchSource, FlushReport, OpStatus, SaveOutcome, SyncState,
};
use crate::cache::{store, Cache, SqliteCache};
use crate::config::{Config, SyncConfig};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{Error, Result};
use crate::remote::{
    HttpIssueApi, IssueApi, LiveChannel, LiveConfig, LiveSignal, RemoteError, RemoteResult,
    Transport, TransportFactory, WebSocketTransport,
};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Messages processed by the actor.
pub(super) enum Command {
    LoadInitial {
        reply: Reply<FetchOutcome>,
    },
    Save {
        issue: Issue,
        reply: Reply<SaveOutcome>,
    },
    Delete {
        issue: Issue,
        reply: Reply<DeleteOutcome>,
    },
    SetFilter {
        filter: String,
        reply: Reply<FetchOutcome>,
    },
    NextPage {
        reply: Reply<FetchOutcome>,
    },
    Flush {
        reply: oneshot::Sender<FlushReport>,
    },
    SetToken {
        token: Option<String>,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    /// A signal from the live channel with the given instance id.
    Live {
        channel: u64,
        signal: LiveSignal,
    },
    Fetched {
        generation: u64,
        query: Query,
        previous: Query,
        /// Serve the cached snapshot if the remote is unreachable.
        fallback: bool,
        result: RemoteResult<Vec<Issue>>,
        reply: Option<Reply<FetchOutcome>>,
    },
    Saved {
        request: Issue,
        /// Outbox seq of the record when the request was sent.
        pending: Option<u64>,
        result: RemoteResult<Issue>,
        reply: Reply<SaveOutcome>,
    },
    Deleted {
        id: IssueId,
        result: RemoteResult<Issue>,
        reply: Reply<DeleteOutcome>,
    },
    Replayed {
        entry: PendingEntry,
        result: RemoteResult<Issue>,
    },
    FlushFinished {
        report: FlushReport,
    },
    /// The backoff after a failed replay elapsed.
    RetryFlush,
}

fn respond<T>(reply: Reply<T>, result: Result<T>) {
    // The caller may have stopped waiting.
    let _ = reply.send(result);
}

/// Tunables of the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Refetch page 1 when the remote becomes reachable again.
    pub refresh_on_reconnect: bool,
    pub queue_capacity: usize,
    /// First wait before replaying work that failed in transit while the
    /// remote still looked reachable. Doubles up to `retry_max_delay`.
    pub retry_initial_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            refresh_on_reconnect: true,
            queue_capacity: 64,
            retry_initial_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            refresh_on_reconnect: config.refresh_on_reconnect,
            queue_capacity: config.queue_capacity,
            retry_initial_delay: config.retry_initial_delay(),
            retry_max_delay: config.retry_max_delay(),
        }
    }
}

/// Builder for the synchronizer actor.
pub struct Synchronizer {
    api: Arc<dyn IssueApi>,
    cache: Arc<dyn Cache>,
    monitor: ConnectivityMonitor,
    live: Option<(LiveConfig, TransportFactory)>,
    token: Option<String>,
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(api: Arc<dyn IssueApi>, cache: Arc<dyn Cache>, monitor: ConnectivityMonitor) -> Self {
        Self {
            api,
            cache,
            monitor,
            live: None,
            token: None,
            options: SyncOptions::default(),
        }
    }

    /// Builds the production stack: HTTP client, SQLite cache, WebSocket
    /// live channel.
    pub fn from_config(config: &Config, monitor: ConnectivityMonitor) -> Result<Self> {
        let api = HttpIssueApi::new(&config.remote.base_url, config.remote.timeout())?;
        let cache = SqliteCache::open(&config.cache.resolved_path()?)?;
        let connect: TransportFactory =
            Arc::new(|| Box::new(WebSocketTransport::new()) as Box<dyn Transport>);

        Ok(Self::new(Arc::new(api), Arc::new(cache), monitor)
            .with_live_channel(config.remote.live_config(), connect)
            .with_token(config.token())
            .with_options(SyncOptions::from(&config.sync)))
    }

    /// Enables the live channel. Without it, only explicit fetches update
    /// the snapshot.
    pub fn with_live_channel(mut self, config: LiveConfig, connect: TransportFactory) -> Self {
        self.live = Some((config, connect));
        self
    }

    /// Initial bearer token. Empty counts as absent.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Restores the cached snapshot and outbox, then starts the actor.
    ///
    /// The returned handle already reflects the restored state. Dropping the
    /// last clone of the handle stops the actor.
    pub async fn spawn(self) -> SyncHandle {
        let cached = store::load_snapshot(self.cache.as_ref()).await;
        let outbox = store::load_outbox(self.cache.as_ref()).await;

        let (tx, rx) = mpsc::channel(self.options.queue_capacity.max(1));
        let cancel = CancellationToken::new();
        let actor = Actor::new(self, cached, outbox, rx, tx.downgrade(), cancel.clone());
        let state = actor.state_tx.subscribe();
        tokio::spawn(actor.run());

        SyncHandle {
            tx,
            state,
            _guard: Arc::new(cancel.drop_guard()),
        }
    }
}

/// Client side of the synchronizer. Cheap to clone.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<Command>,
    state: watch::Receiver<SyncState>,
    _guard: Arc<DropGuard>,
}

impl SyncHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).await.map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Shows the cached snapshot, then refreshes page 1 when the remote is
    /// ready.
    pub async fn load_initial(&self) -> Result<FetchOutcome> {
        self.request(|reply| Command::LoadInitial { reply }).await
    }

    /// Creates or updates an issue, falling back to a local write when the
    /// remote is unreachable.
    pub async fn save(&self, issue: Issue) -> Result<SaveOutcome> {
        self.request(|reply| Command::Save { issue, reply }).await
    }

    pub async fn delete(&self, issue: Issue) -> Result<DeleteOutcome> {
        self.request(|reply| Command::Delete { issue, reply }).await
    }

    /// Replaces the snapshot with page 1 of the filtered list.
    pub async fn set_filter(&self, filter: impl Into<String>) -> Result<FetchOutcome> {
        let filter = filter.into();
        self.request(|reply| Command::SetFilter { filter, reply })
            .await
    }

    /// Appends the next page.
    pub async fn next_page(&self) -> Result<FetchOutcome> {
        self.request(|reply| Command::NextPage { reply }).await
    }

    /// Replays the outbox and waits for the pass to finish.
    pub async fn flush(&self) -> Result<FlushReport> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Flush { reply })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// The host is about to be suspended: flush what can be flushed and
    /// report back before yielding.
    pub async fn suspend(&self) -> Result<FlushReport> {
        info!("suspend requested, flushing outbox");
        let report = self.flush().await?;
        info!(
            attempted = report.attempted,
            failed = report.failed,
            "ready to suspend"
        );
        Ok(report)
    }

    /// Sets or clears the bearer token. Empty counts as absent.
    pub async fn set_token(&self, token: Option<String>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::SetToken { token, reply })
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)
    }

    /// Stops the actor. Results of calls still in flight are discarded.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown { reply }).await.is_err() {
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }

    /// Receiver of published state.
    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// The latest published state.
    pub fn current(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Waits until the published state satisfies `pred`.
    pub async fn wait_until(&self, mut pred: impl FnMut(&SyncState) -> bool) -> Result<SyncState> {
        let mut rx = self.state.clone();
        let state = rx.wait_for(|s| pred(s)).await.map_err(|_| Error::Closed)?;
        Ok((*state).clone())
    }
}

struct FlushRun {
    waiters: Vec<oneshot::Sender<FlushReport>>,
    /// Requests that arrived during this pass; they get the next pass.
    queued: Vec<oneshot::Sender<FlushReport>>,
    rerun: bool,
}

struct Actor {
    api: Arc<dyn IssueApi>,
    cache: Arc<dyn Cache>,
    /// Keeps the connectivity sender alive for `connectivity`.
    _monitor: ConnectivityMonitor,
    connectivity: watch::Receiver<bool>,
    live_setup: Option<(LiveConfig, TransportFactory)>,
    options: SyncOptions,

    rx: mpsc::Receiver<Command>,
    tx: mpsc::WeakSender<Command>,
    state_tx: watch::Sender<SyncState>,
    cancel: CancellationToken,

    snapshot: Snapshot,
    outbox: Outbox,
    placeholders: PlaceholderAllocator,
    has_cached_snapshot: bool,
    loaded: bool,

    cursor: Query,
    token: Option<String>,
    online: bool,

    fetch: OpStatus,
    save: OpStatus,
    delete: OpStatus,
    generation: u64,

    live: Option<LiveChannel>,
    live_id: u64,
    live_connected: bool,

    flush: Option<FlushRun>,
    /// Placeholders whose create call is in flight.
    creating: HashSet<IssueId>,
    retry_scheduled: bool,
    retry_delay: Duration,
}

impl Actor {
    fn new(
        sync: Synchronizer,
        cached: Option<Snapshot>,
        outbox: Outbox,
        rx: mpsc::Receiver<Command>,
        tx: mpsc::WeakSender<Command>,
        cancel: CancellationToken,
    ) -> Self {
        let has_cached_snapshot = cached.is_some();
        let snapshot = cached.unwrap_or_default();
        let placeholders = PlaceholderAllocator::seeded(
            snapshot
                .ids()
                .chain(outbox.ids())
                .chain(outbox.renamed_ids()),
        );
        let mut connectivity = sync.monitor.subscribe();
        let online = *connectivity.borrow_and_update();
        let (state_tx, _) = watch::channel(SyncState::default());
        let retry_delay = sync.options.retry_initial_delay;

        let actor = Actor {
            api: sync.api,
            cache: sync.cache,
            _monitor: sync.monitor,
            connectivity,
            live_setup: sync.live,
            options: sync.options,
            rx,
            tx,
            state_tx,
            cancel,
            snapshot,
            outbox,
            placeholders,
            has_cached_snapshot,
            loaded: false,
            cursor: Query::default(),
            token: sync.token,
            online,
            fetch: OpStatus::Idle,
            save: OpStatus::Idle,
            delete: OpStatus::Idle,
            generation: 0,
            live: None,
            live_id: 0,
            live_connected: false,
            flush: None,
            creating: HashSet::new(),
            retry_scheduled: false,
            retry_delay,
        };
        actor.publish();
        actor
    }

    async fn run(mut self) {
        info!(
            issues = self.snapshot.len(),
            pending = self.outbox.len(),
            online = self.online,
            "synchronizer started"
        );
        self.readiness_changed(false, false);
        self.publish();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = self.rx.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                changed = self.connectivity.changed() => {
                    if changed.is_ok() {
                        let online = *self.connectivity.borrow_and_update();
                        self.set_online(online);
                    }
                }
            }
            self.publish();
        }

        self.teardown();
        self.publish();
        info!("synchronizer stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::LoadInitial { reply } => self.on_load_initial(reply),
            Command::Save { issue, reply } => self.on_save(issue, reply).await,
            Command::Delete { issue, reply } => self.on_delete(issue, reply).await,
            Command::SetFilter { filter, reply } => self.on_set_filter(filter, reply),
            Command::NextPage { reply } => self.on_next_page(reply),
            Command::Flush { reply } => self.request_flush(Some(reply)),
            Command::SetToken { token, reply } => {
                self.set_token(token);
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            Command::Live { channel, signal } => self.on_live(channel, signal).await,
            Command::Fetched {
                generation,
                query,
                previous,
                fallback,
                result,
                reply,
            } => {
                self.on_fetched(generation, query, previous, fallback, result, reply)
                    .await
            }
            Command::Saved {
                request,
                pending,
                result,
                reply,
            } => self.on_saved(request, pending, result, reply).await,
            Command::Deleted { id, result, reply } => self.on_deleted(id, result, reply).await,
            Command::Replayed { entry, result } => self.on_replayed(entry, result).await,
            Command::FlushFinished { report } => self.on_flush_finished(report),
            Command::RetryFlush => self.on_retry_flush(),
        }
    }

    fn is_ready(&self) -> bool {
        self.online && self.token.is_some()
    }

    fn publish(&self) {
        let ready = self.is_ready();
        self.state_tx.send_replace(SyncState {
            issues: self.snapshot.issues().to_vec(),
            fetch: self.fetch.clone(),
            save: self.save.clone(),
            delete: self.delete.clone(),
            filter: self.cursor.filter.clone(),
            page: self.cursor.page,
            online: self.online,
            authenticated: self.token.is_some(),
            ready,
            live: self.live_connected,
            pending: self.outbox.len(),
            flushing: self.flush.is_some(),
        });
    }

    /// Writes snapshot and outbox. Failures are logged; the in-memory state
    /// stays authoritative until the next successful write.
    async fn persist(&mut self) {
        match store::save_snapshot(self.cache.as_ref(), &self.snapshot).await {
            Ok(()) => self.has_cached_snapshot = true,
            Err(e) => warn!(error = %e, "failed to persist snapshot"),
        }
        if let Err(e) = store::save_outbox(self.cache.as_ref(), &self.outbox).await {
            warn!(error = %e, "failed to persist outbox");
        }
    }

    fn merge(&mut self, issue: Issue) {
        if let Err(e) = self.snapshot.upsert(issue) {
            warn!(error = %e, "dropping record without id");
        }
    }

    /// Runs a network call off the actor and feeds its completion back.
    fn spawn_call<F>(&self, call: F)
    where
        F: Future<Output = Command> + Send + 'static,
    {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                command = call => {
                    let _ = tx.send(command).await;
                }
            }
        });
    }

    // -- connectivity and credential --

    fn set_online(&mut self, online: bool) {
        if online == self.online {
            return;
        }
        let was_ready = self.is_ready();
        self.online = online;
        debug!(online, "connectivity transition");
        self.readiness_changed(was_ready, false);
    }

    fn set_token(&mut self, token: Option<String>) {
        let token = token.filter(|t| !t.is_empty());
        if token == self.token {
            return;
        }
        let was_ready = self.is_ready();
        let replaced = self.token.is_some() && token.is_some();
        self.token = token;
        debug!(authenticated = self.token.is_some(), "credential changed");
        self.readiness_changed(was_ready, replaced);
    }

    fn readiness_changed(&mut self, was_ready: bool, token_replaced: bool) {
        let ready = self.is_ready();
        if ready && !was_ready {
            info!("remote ready");
            self.retry_delay = self.options.retry_initial_delay;
            self.open_live();
            self.request_flush(None);
            if self.options.refresh_on_reconnect && self.loaded {
                let previous = self.cursor.clone();
                self.cursor = Query::first(self.cursor.filter.clone());
                self.start_fetch(previous, None, true);
            }
        } else if ready && token_replaced {
            self.open_live();
        } else if !ready && was_ready {
            info!("remote unavailable, working from cache");
            self.close_live();
        }
    }

    fn open_live(&mut self) {
        self.close_live();
        let Some((config, connect)) = &self.live_setup else {
            return;
        };
        let Some(token) = self.token.clone() else {
            return;
        };
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        self.live_id += 1;
        let channel = self.live_id;
        self.live = Some(LiveChannel::open(
            config.clone(),
            Arc::clone(connect),
            token,
            tx,
            move |signal| Command::Live { channel, signal },
        ));
    }

    fn close_live(&mut self) {
        if let Some(live) = self.live.take() {
            live.close();
        }
        self.live_connected = false;
    }

    /// Closes the live channel and waits for its task before tearing down.
    async fn stop(&mut self) {
        if let Some(live) = self.live.take() {
            live.shutdown().await;
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        self.close_live();
        self.cancel.cancel();
        self.flush = None;
        self.creating.clear();
    }

    // -- fetch --

    fn on_load_initial(&mut self, reply: Reply<FetchOutcome>) {
        self.loaded = true;
        if self.is_ready() {
            let previous = self.cursor.clone();
            self.cursor = Query::first(self.cursor.filter.clone());
            self.start_fetch(previous, Some(reply), true);
            return;
        }
        debug!(issues = self.snapshot.len(), "remote not ready, serving cache");
        self.fetch = OpStatus::Succeeded { local: true };
        respond(
            reply,
            Ok(FetchOutcome {
                source: FetchSource::Cache,
                page: self.cursor.page,
                count: self.snapshot.len(),
            }),
        );
    }

    fn on_set_filter(&mut self, filter: String, reply: Reply<FetchOutcome>) {
        if !self.is_ready() {
            let err = Error::NotConnected;
            self.fetch = OpStatus::failed(&err);
            respond(reply, Err(err));
            return;
        }
        let previous = self.cursor.clone();
        self.cursor = Query::first(filter);
        self.start_fetch(previous, Some(reply), false);
    }

    fn on_next_page(&mut self, reply: Reply<FetchOutcome>) {
        if !self.is_ready() {
            respond(reply, Err(Error::NotConnected));
            return;
        }
        if self.fetch.is_in_flight() {
            respond(reply, Err(Error::FetchInFlight));
            return;
        }
        let previous = self.cursor.clone();
        self.cursor = self.cursor.next();
        self.start_fetch(previous, Some(reply), false);
    }

    /// Fetches the page at the cursor. With `fallback`, a transport failure
    /// on page 1 keeps the cached snapshot and reports it as the result.
    fn start_fetch(
        &mut self,
        previous: Query,
        reply: Option<Reply<FetchOutcome>>,
        fallback: bool,
    ) {
        let Some(token) = self.token.clone() else {
            self.cursor = previous;
            if let Some(reply) = reply {
                respond(reply, Err(Error::NotConnected));
            }
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        let query = self.cursor.clone();
        self.fetch = OpStatus::InFlight;
        debug!(generation, filter = %query.filter, page = query.page, "fetching");

        let api = Arc::clone(&self.api);
        self.spawn_call(async move {
            let result = api.list(&token, &query).await;
            Command::Fetched {
                generation,
                query,
                previous,
                fallback,
                result,
                reply,
            }
        });
    }

    async fn on_fetched(
        &mut self,
        generation: u64,
        query: Query,
        previous: Query,
        fallback: bool,
        result: RemoteResult<Vec<Issue>>,
        reply: Option<Reply<FetchOutcome>>,
    ) {
        let outcome = if generation != self.generation {
            debug!(generation, current = self.generation, "discarding stale fetch");
            Err(Error::Superseded)
        } else {
            self.apply_fetch(query, previous, fallback, result).await
        };
        if let Some(reply) = reply {
            respond(reply, outcome);
        }
    }

    async fn apply_fetch(
        &mut self,
        query: Query,
        previous: Query,
        fallback: bool,
        result: RemoteResult<Vec<Issue>>,
    ) -> Result<FetchOutcome> {
        match result {
            Ok(issues) => {
                let count = issues.len();
                if query.is_first_page() {
                    self.snapshot.replace_all(issues);
                } else {
                    self.snapshot.append_page(issues);
                }
                self.rebase_pending();
                self.fetch = OpStatus::Succeeded { local: false };
                self.persist().await;
                debug!(page = query.page, count, "fetch applied");
                Ok(FetchOutcome {
                    source: FetchSource::Remote,
                    page: query.page,
                    count,
                })
            }
            Err(e)
                if fallback
                    && e.is_transport()
                    && query.is_first_page()
                    && self.has_cached_snapshot =>
            {
                warn!(error = %e, "fetch failed, keeping cached snapshot");
                self.cursor = previous;
                self.fetch = OpStatus::Succeeded { local: true };
                Ok(FetchOutcome {
                    source: FetchSource::Cache,
                    page: self.cursor.page,
                    count: self.snapshot.len(),
                })
            }
            Err(e) => {
                warn!(page = query.page, error = %e, "fetch failed");
                self.cursor = previous;
                let err = Error::from(e);
                self.fetch = OpStatus::failed(&err);
                Err(err)
            }
        }
    }

    /// Reapplies unconfirmed local mutations on top of fresh server data.
    fn rebase_pending(&mut self) {
        for entry in self.outbox.entries() {
            match &entry.op {
                PendingOp::Upsert { issue } => {
                    if let Err(e) = self.snapshot.upsert(issue.clone()) {
                        warn!(error = %e, "pending record without id");
                    }
                }
                PendingOp::Delete { id } => {
                    self.snapshot.remove(id);
                }
            }
        }
    }

    // -- save --

    /// Maps a placeholder that was already created remotely to its server id.
    fn resolve(&self, issue: &mut Issue) {
        let Some(server_id) = issue.id.as_ref().and_then(|id| self.outbox.resolve(id)) else {
            return;
        };
        debug!(from = ?issue.id, to = %server_id, "placeholder already created");
        issue.id = Some(server_id.clone());
    }

    async fn on_save(&mut self, mut issue: Issue, reply: Reply<SaveOutcome>) {
        self.resolve(&mut issue);
        if let Err(e) = issue.validate() {
            let err = Error::from(e);
            self.save = OpStatus::failed(&err);
            respond(reply, Err(err));
            return;
        }
        self.save = OpStatus::InFlight;

        let create_in_flight = issue
            .id
            .as_ref()
            .is_some_and(|id| self.creating.contains(id));
        let token = match self.token.clone() {
            Some(token) if self.online && !create_in_flight => token,
            _ => {
                let result = self.save_locally(issue).await;
                respond(reply, result);
                return;
            }
        };

        let pending = issue
            .id
            .as_ref()
            .and_then(|id| self.outbox.entry(id))
            .map(|entry| entry.seq);
        if let Some(id) = issue.id.as_ref().filter(|id| id.is_placeholder()) {
            self.creating.insert(id.clone());
        }

        let api = Arc::clone(&self.api);
        self.spawn_call(async move {
            let result = if issue.has_server_id() {
                api.update(&token, &issue).await
            } else {
                let fresh = Issue {
                    id: None,
                    ..issue.clone()
                };
                api.create(&token, &fresh).await
            };
            Command::Saved {
                request: issue,
                pending,
                result,
                reply,
            }
        });
    }

    async fn save_locally(&mut self, mut issue: Issue) -> Result<SaveOutcome> {
        if issue.id.is_none() {
            issue.id = Some(self.placeholders.next_id());
        }
        let recorded = self
            .snapshot
            .upsert(issue.clone())
            .and_then(|_| self.outbox.record_upsert(issue.clone()));
        if let Err(e) = recorded {
            let err = Error::from(e);
            self.save = OpStatus::failed(&err);
            return Err(err);
        }
        self.persist().await;
        self.save = OpStatus::Succeeded { local: true };
        info!(id = ?issue.id, "saved locally, queued for replay");
        Ok(SaveOutcome { issue, local: true })
    }

    async fn on_saved(
        &mut self,
        request: Issue,
        pending: Option<u64>,
        result: RemoteResult<Issue>,
        reply: Reply<SaveOutcome>,
    ) {
        let placeholder = request.id.clone().filter(IssueId::is_placeholder);
        if let Some(id) = &placeholder {
            self.creating.remove(id);
        }

        let saved = match result {
            Ok(saved) => saved,
            Err(e) if e.is_transport() => {
                warn!(error = %e, "save failed in transit, keeping it locally");
                let result = match &placeholder {
                    Some(id) if !self.snapshot.contains(id) => {
                        // Deleted locally while the call was in flight.
                        self.save = OpStatus::Succeeded { local: true };
                        Ok(SaveOutcome {
                            issue: request,
                            local: true,
                        })
                    }
                    _ => self.save_locally(request).await,
                };
                respond(reply, result);
                self.schedule_retry();
                return;
            }
            Err(e) => {
                let err = Error::from(e);
                warn!(error = %err, "save rejected");
                self.save = OpStatus::failed(&err);
                respond(reply, Err(err));
                return;
            }
        };

        let Some(server_id) = saved.id.clone() else {
            let err = Error::from(RemoteError::Decode("saved issue has no id".into()));
            self.save = OpStatus::failed(&err);
            respond(reply, Err(err));
            return;
        };

        if let Some(id) = &placeholder {
            if !self.snapshot.contains(id) {
                info!(id = %server_id, "record deleted during create, queueing remote delete");
                self.outbox.rename(id, &server_id);
                self.outbox.record_delete(server_id);
                self.persist().await;
                self.save = OpStatus::Succeeded { local: false };
                respond(
                    reply,
                    Ok(SaveOutcome {
                        issue: saved,
                        local: false,
                    }),
                );
                self.request_flush(None);
                return;
            }
            self.snapshot.rename(id, &server_id);
            self.outbox.rename(id, &server_id);
        }

        if let Some(seq) = pending {
            self.outbox.complete(&server_id, seq);
        }
        // A newer local edit (or delete) queued meanwhile stays authoritative.
        if self.outbox.entry(&server_id).is_none() {
            self.merge(saved.clone());
        }
        self.persist().await;
        self.save = OpStatus::Succeeded { local: false };
        debug!(id = %server_id, "saved remotely");
        respond(
            reply,
            Ok(SaveOutcome {
                issue: saved,
                local: false,
            }),
        );
    }

    // -- delete --

    async fn on_delete(&mut self, mut issue: Issue, reply: Reply<DeleteOutcome>) {
        self.resolve(&mut issue);
        let id = match issue.require_id("deleted") {
            Ok(id) => id.clone(),
            Err(e) => {
                let err = Error::from(e);
                self.delete = OpStatus::failed(&err);
                respond(reply, Err(err));
                return;
            }
        };
        self.delete = OpStatus::InFlight;

        if id.is_placeholder() {
            // Never reached the server; dropping it locally is the whole delete.
            self.snapshot.remove(&id);
            self.outbox.discard(&id);
            self.persist().await;
            self.delete = OpStatus::Succeeded { local: true };
            respond(reply, Ok(DeleteOutcome { id, local: true }));
            return;
        }

        let Some(token) = self.token.clone().filter(|_| self.online) else {
            let outcome = self.delete_locally(id).await;
            respond(reply, Ok(outcome));
            return;
        };

        let api = Arc::clone(&self.api);
        self.spawn_call(async move {
            let result = api.delete(&token, &issue).await;
            Command::Deleted { id, result, reply }
        });
    }

    async fn delete_locally(&mut self, id: IssueId) -> DeleteOutcome {
        self.snapshot.remove(&id);
        self.outbox.record_delete(id.clone());
        self.persist().await;
        self.delete = OpStatus::Succeeded { local: true };
        info!(id = %id, "deleted locally, queued for replay");
        DeleteOutcome { id, local: true }
    }

    async fn on_deleted(
        &mut self,
        id: IssueId,
        result: RemoteResult<Issue>,
        reply: Reply<DeleteOutcome>,
    ) {
        match result {
            Err(e) if e.is_transport() => {
                warn!(error = %e, "delete failed in transit, keeping it locally");
                let outcome = self.delete_locally(id).await;
                respond(reply, Ok(outcome));
                self.schedule_retry();
            }
            Err(e) if !e.is_not_found() => {
                let err = Error::from(e);
                warn!(id = %id, error = %err, "delete rejected");
                self.delete = OpStatus::failed(&err);
                respond(reply, Err(err));
            }
            _ => {
                self.snapshot.remove(&id);
                self.outbox.discard(&id);
                self.persist().await;
                self.delete = OpStatus::Succeeded { local: false };
                debug!(id = %id, "deleted remotely");
                respond(reply, Ok(DeleteOutcome { id, local: false }));
            }
        }
    }

    // -- live channel --

    async fn on_live(&mut self, channel: u64, signal: LiveSignal) {
        if channel != self.live_id || self.live.is_none() {
            debug!(channel, "dropping signal from a closed live channel");
            return;
        }
        match signal {
            LiveSignal::Connected => self.live_connected = true,
            LiveSignal::Disconnected { .. } => self.live_connected = false,
            LiveSignal::GaveUp { attempts, error } => {
                warn!(attempts, error = %error, "live channel gave up");
                self.live_connected = false;
                self.live = None;
            }
            LiveSignal::Event(event) => self.apply_event(event).await,
        }
    }

    async fn apply_event(&mut self, event: LiveEvent) {
        if self.token.is_none() {
            return;
        }
        let Some(id) = event.id().cloned() else {
            warn!(kind = event.kind(), "ignoring live event without id");
            return;
        };

        let changed = match event {
            LiveEvent::Created(issue) | LiveEvent::Updated(issue) => {
                if self.outbox.entry(&id).is_some() {
                    debug!(id = %id, "ignoring remote change to a record with local changes");
                    false
                } else {
                    self.merge(issue);
                    true
                }
            }
            LiveEvent::Deleted(_) => {
                let removed = self.snapshot.remove(&id).is_some();
                let dropped = self.outbox.discard(&id).is_some();
                removed || dropped
            }
        };
        if changed {
            self.persist().await;
        }
    }

    // -- flush --

    fn request_flush(&mut self, waiter: Option<oneshot::Sender<FlushReport>>) {
        if let Some(run) = &mut self.flush {
            run.rerun = true;
            run.queued.extend(waiter);
            return;
        }
        self.start_flush(waiter.into_iter().collect());
    }

    fn start_flush(&mut self, waiters: Vec<oneshot::Sender<FlushReport>>) {
        let token = match (&self.token, self.tx.upgrade()) {
            (Some(token), Some(tx)) if self.online => Some((token.clone(), tx)),
            _ => None,
        };
        let Some((token, tx)) = token else {
            for waiter in waiters {
                let _ = waiter.send(FlushReport::default());
            }
            return;
        };

        let orphans: Vec<Issue> = self
            .snapshot
            .placeholders()
            .filter(|issue| issue.id.as_ref().is_some_and(|id| self.outbox.entry(id).is_none()))
            .cloned()
            .collect();
        for issue in orphans {
            if let Err(e) = self.outbox.record_upsert(issue) {
                warn!(error = %e, "cannot queue local record");
            }
        }

        let batch: Vec<PendingEntry> = self
            .outbox
            .entries()
            .iter()
            .filter(|entry| entry.id().is_some_and(|id| !self.creating.contains(id)))
            .cloned()
            .collect();
        if batch.is_empty() {
            for waiter in waiters {
                let _ = waiter.send(FlushReport::default());
            }
            return;
        }

        for entry in &batch {
            if let (true, Some(id)) = (entry.is_create(), entry.id()) {
                self.creating.insert(id.clone());
            }
        }
        info!(entries = batch.len(), "flushing outbox");
        flush::spawn(
            Arc::clone(&self.api),
            token,
            batch,
            tx,
            self.cancel.child_token(),
        );
        self.flush = Some(FlushRun {
            waiters,
            queued: Vec::new(),
            rerun: false,
        });
    }

    fn schedule_rerun(&mut self) {
        match &mut self.flush {
            Some(run) => run.rerun = true,
            None => self.request_flush(None),
        }
    }

    async fn on_replayed(&mut self, entry: PendingEntry, result: RemoteResult<Issue>) {
        let Some(id) = entry.id().cloned() else {
            return;
        };
        if entry.is_create() {
            self.creating.remove(&id);
        }
        let remote = match result {
            Ok(remote) => remote,
            // Already logged by the flush task; the entry stays queued.
            Err(e) => {
                if e.is_transport() {
                    self.schedule_retry();
                }
                return;
            }
        };

        match &entry.op {
            PendingOp::Upsert { .. } if entry.is_create() => {
                let Some(server_id) = remote.id.clone() else {
                    warn!(id = %id, "created issue has no id, keeping entry");
                    return;
                };
                if !self.snapshot.contains(&id) {
                    info!(id = %server_id, "record deleted during replay, queueing remote delete");
                    self.outbox.discard(&id);
                    self.outbox.rename(&id, &server_id);
                    self.outbox.record_delete(server_id);
                    self.schedule_rerun();
                } else {
                    self.snapshot.rename(&id, &server_id);
                    self.outbox.rename(&id, &server_id);
                    if self.outbox.complete(&server_id, entry.seq) {
                        self.merge(remote);
                    } else {
                        self.schedule_rerun();
                    }
                }
            }
            PendingOp::Upsert { .. } => {
                if self.outbox.complete(&id, entry.seq) && self.snapshot.contains(&id) {
                    self.merge(remote);
                }
            }
            PendingOp::Delete { .. } => {
                self.outbox.complete(&id, entry.seq);
            }
        }
        self.persist().await;
    }

    fn on_flush_finished(&mut self, report: FlushReport) {
        let Some(run) = self.flush.take() else {
            return;
        };
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            pending = self.outbox.len(),
            "flush finished"
        );
        if report.failed == 0 {
            self.retry_delay = self.options.retry_initial_delay;
        }
        for waiter in run.waiters {
            let _ = waiter.send(report);
        }
        if run.rerun {
            self.start_flush(run.queued);
        } else {
            for waiter in run.queued {
                let _ = waiter.send(report);
            }
        }
    }

    /// Replays the outbox after a backoff. Used when work failed in transit
    /// while the remote still looked reachable, so no readiness transition
    /// will trigger the replay.
    fn schedule_retry(&mut self) {
        if self.retry_scheduled || !self.is_ready() {
            return;
        }
        let delay = self.retry_delay;
        self.retry_delay = delay
            .saturating_mul(2)
            .min(self.options.retry_max_delay);
        self.retry_scheduled = true;
        debug!(delay_ms = delay.as_millis() as u64, "scheduling outbox retry");
        self.spawn_call(async move {
            tokio::time::sleep(delay).await;
            Command::RetryFlush
        });
    }

    fn on_retry_flush(&mut self) {
        self.retry_scheduled = false;
        if self.is_ready() && !self.outbox.is_empty() {
            info!(pending = self.outbox.len(), "retrying outbox replay");
            self.request_flush(None);
        }
    }
}
