// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The live channel: pushed create/update/delete events from the server.
//!
//! [`LiveChannel::open`] spawns a background task that connects, sends the
//! authorization message, then forwards every decoded event. Lost connections
//! are retried with exponential backoff. Dropping or closing the channel
//! cancels the task; nothing is forwarded after that.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use issync_core::{ClientMessage, LiveEvent};

use super::transport::{Transport, TransportError, TransportResult};

/// Builds a fresh transport for every connection attempt.
pub type TransportFactory = Arc<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

/// Connection settings for the live channel.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Consecutive failed attempts before giving up (0 = unlimited).
    pub max_retries: u32,
    /// Initial delay for exponential backoff (milliseconds).
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts (seconds).
    pub max_delay_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000".to_string(),
            max_retries: 10,
            initial_delay_ms: 100,
            max_delay_secs: 30,
        }
    }
}

/// What the channel reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveSignal {
    /// Connected and authorized.
    Connected,
    /// An event pushed by the server.
    Event(LiveEvent),
    /// The connection dropped; a reconnect follows.
    Disconnected { error: Option<String> },
    /// Retries exhausted. The channel task has exited.
    GaveUp { attempts: u32, error: String },
}

/// Handle to a running live channel.
pub struct LiveChannel {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveChannel {
    /// Opens the channel.
    ///
    /// Signals are delivered on `tx`, each mapped through `wrap` so the owner
    /// can tag them (for example with the id of this channel instance).
    pub fn open<M, F>(
        config: LiveConfig,
        connect: TransportFactory,
        token: String,
        tx: mpsc::Sender<M>,
        wrap: F,
    ) -> Self
    where
        M: Send + 'static,
        F: Fn(LiveSignal) -> M + Send + Sync + 'static,
    {
        let cancel = CancellationToken::new();
        let runner = Runner {
            config,
            connect,
            token,
            tx,
            wrap,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(runner.run());
        LiveChannel {
            cancel,
            task: Some(task),
        }
    }

    /// Closes the channel. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Closes the channel and waits for its task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum PumpExit {
    Cancelled,
    OwnerGone,
    Lost(Option<String>),
}

struct Runner<M, F> {
    config: LiveConfig,
    connect: TransportFactory,
    token: String,
    tx: mpsc::Sender<M>,
    wrap: F,
    cancel: CancellationToken,
}

impl<M, F> Runner<M, F>
where
    M: Send + 'static,
    F: Fn(LiveSignal) -> M + Send + Sync + 'static,
{
    /// False once the owner is gone or the channel was closed.
    async fn emit(&self, signal: LiveSignal) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send((self.wrap)(signal)) => sent.is_ok(),
        }
    }

    async fn handshake(&self, transport: &mut dyn Transport) -> TransportResult<()> {
        transport.connect(&self.config.url).await?;
        transport
            .send(ClientMessage::authorization(self.token.clone()))
            .await
    }

    async fn pump(&self, transport: &mut dyn Transport) -> PumpExit {
        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                received = transport.recv() => received,
            };
            match received {
                Ok(Some(event)) => {
                    debug!(kind = event.kind(), id = ?event.id(), "live event");
                    if !self.emit(LiveSignal::Event(event)).await {
                        return PumpExit::OwnerGone;
                    }
                }
                Ok(None) => return PumpExit::Lost(None),
                Err(TransportError::Malformed(e)) => {
                    warn!(error = %e, "skipping undecodable live message");
                }
                Err(e) => return PumpExit::Lost(Some(e.to_string())),
            }
        }
    }

    async fn run(self) {
        let mut attempt = 0u32;
        let mut delay_ms = self.config.initial_delay_ms;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            attempt = attempt.saturating_add(1);
            let mut transport = (self.connect)();

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.handshake(transport.as_mut()) => result,
            };

            match connected {
                Ok(()) => {
                    info!(url = %self.config.url, "live channel connected");
                    attempt = 0;
                    delay_ms = self.config.initial_delay_ms;

                    let exit = if self.emit(LiveSignal::Connected).await {
                        self.pump(transport.as_mut()).await
                    } else {
                        PumpExit::OwnerGone
                    };
                    let _ = transport.disconnect().await;

                    match exit {
                        PumpExit::Cancelled | PumpExit::OwnerGone => return,
                        PumpExit::Lost(error) => {
                            warn!(error = ?error, "live channel lost, reconnecting");
                            if !self.emit(LiveSignal::Disconnected { error }).await {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let error = e.to_string();
                    debug!(attempt, error = %error, "live channel connect failed");
                    let _ = transport.disconnect().await;

                    if self.config.max_retries > 0 && attempt >= self.config.max_retries {
                        warn!(attempts = attempt, error = %error, "live channel giving up");
                        let _ = self
                            .emit(LiveSignal::GaveUp {
                                attempts: attempt,
                                error,
                            })
                            .await;
                        return;
                    }
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            }
            delay_ms = std::cmp::min(
                delay_ms.saturating_mul(2),
                self.config.max_delay_secs.saturating_mul(1000),
            );
        }
    }
}

#[cfg(test)]
#[path = "live_tests.rs"]
mod tests;
