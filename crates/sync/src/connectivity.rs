// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Network reachability.
//!
//! [`ConnectivityMonitor`] is the single source of truth for "can we reach the
//! remote right now". Hosts with OS connectivity callbacks feed it through
//! [`ConnectivityMonitor::set_online`]; others run a [`Probe`] on an interval
//! with [`ConnectivityMonitor::spawn_probe`].

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Shared reachability flag. Clones observe and update the same value.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Records the current reachability. Returns true if it changed.
    ///
    /// Subscribers are only notified on a change.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });
        if changed {
            info!(online, "connectivity changed");
        }
        changed
    }

    /// Runs `probe` every `interval` until `cancel` fires.
    ///
    /// The first check happens immediately.
    pub fn spawn_probe<P: Probe>(
        &self,
        probe: P,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let online = tokio::select! {
                    _ = cancel.cancelled() => return,
                    online = probe.check() => online,
                };
                monitor.set_online(online);
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

/// A reachability check.
pub trait Probe: Send + Sync + 'static {
    /// Resolves to true if the remote looks reachable.
    fn check(&self) -> BoxFuture<'_, bool>;
}

/// Probes by opening a TCP connection to the remote host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe for `host:port`.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Probe for the host of an http(s) or ws(s) URL, using the scheme's
    /// default port when none is given.
    pub fn for_url(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid URL '{}': {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Config(format!("URL '{}' has no host", url)))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| Error::Config(format!("URL '{}' has no port", url)))?;
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        Ok(Self::new(format!("{}:{}", host, port), timeout))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Probe for TcpProbe {
    fn check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let result = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await;
            let online = matches!(result, Ok(Ok(_)));
            debug!(addr = %self.addr, online, "probe");
            online
        })
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
