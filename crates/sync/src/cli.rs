// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line front end.
//!
//! Every invocation probes the remote once, runs one command against a
//! freshly spawned synchronizer, then flushes the outbox before exiting.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use issync_core::{Issue, IssueId};

use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, Probe, TcpProbe};
use crate::error::{Error, Result};
use crate::sync::{SyncHandle, SyncState, Synchronizer};

const QUICKSTART_HELP: &str = "\
Get started:
  issync list                  Show the first page of issues
  issync add -t \"Fix login\"   Create an issue (queued when offline)
  issync flush                 Push queued changes
  issync watch                 Follow live changes until Ctrl-C";

#[derive(Parser)]
#[command(name = "issync", version)]
#[command(about = "Offline-tolerant issue synchronizer")]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List issues
    List {
        /// Only issues whose title contains this text
        #[arg(long, short)]
        filter: Option<String>,

        /// Number of pages to fetch
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create an issue
    Add {
        #[arg(long, short)]
        title: String,

        #[arg(long, short)]
        description: Option<String>,

        #[arg(long, short)]
        state: Option<String>,
    },

    /// Change an issue's fields
    Edit {
        id: String,

        #[arg(long, short)]
        title: Option<String>,

        #[arg(long, short)]
        description: Option<String>,

        #[arg(long, short)]
        state: Option<String>,
    },

    /// Delete an issue
    Delete { id: String },

    /// Push queued changes to the server
    Flush,

    /// Print the collection whenever it changes, until interrupted
    Watch,

    /// Show connectivity and queue status
    Status {
        #[arg(long)]
        json: bool,
    },
}

/// A synchronizer plus the probe task feeding its connectivity.
struct Session {
    handle: SyncHandle,
    cancel: CancellationToken,
    prober: JoinHandle<()>,
}

impl Session {
    async fn start(config: &Config) -> Result<Self> {
        let monitor = ConnectivityMonitor::default();
        let probe = TcpProbe::for_url(&config.remote.base_url, config.connectivity.probe_timeout())?;
        monitor.set_online(probe.check().await);

        let cancel = CancellationToken::new();
        let prober = monitor.spawn_probe(
            probe,
            config.connectivity.probe_interval(),
            cancel.clone(),
        );
        let handle = Synchronizer::from_config(config, monitor)?.spawn().await;
        Ok(Session {
            handle,
            cancel,
            prober,
        })
    }

    async fn finish(self) {
        match self.handle.suspend().await {
            Ok(report) if report.failed > 0 => {
                eprintln!("{} change(s) could not be pushed and stay queued", report.failed);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "final flush failed"),
        }
        let _ = self.handle.shutdown().await;
        self.cancel.cancel();
        let _ = self.prober.await;
    }
}

/// Runs one command to completion.
pub async fn run(command: Command, config: &Config) -> Result<()> {
    let session = Session::start(config).await?;
    let result = execute(&session.handle, command).await;
    session.finish().await;
    result
}

async fn execute(handle: &SyncHandle, command: Command) -> Result<()> {
    match command {
        Command::List {
            filter,
            pages,
            json,
        } => {
            let outcome = match filter {
                Some(filter) => handle.set_filter(filter).await?,
                None => handle.load_initial().await?,
            };
            let mut last = outcome.count;
            for _ in 1..pages {
                if last == 0 {
                    break;
                }
                last = handle.next_page().await?.count;
            }
            print_issues(&handle.current(), json)
        }
        Command::Add {
            title,
            description,
            state,
        } => {
            let issue = Issue {
                description: description.unwrap_or_default(),
                state: state.unwrap_or_default(),
                ..Issue::new(title)
            };
            let outcome = handle.save(issue).await?;
            println!(
                "{} {}",
                created_label(outcome.local),
                display_id(&outcome.issue)
            );
            Ok(())
        }
        Command::Edit {
            id,
            title,
            description,
            state,
        } => {
            let id = IssueId::new(id)?;
            let mut issue = lookup(handle, &id)
                .await?
                .ok_or_else(|| Error::Validation(format!("unknown issue: {}", id)))?;
            if let Some(title) = title {
                issue.title = title;
            }
            if let Some(description) = description {
                issue.description = description;
            }
            if let Some(state) = state {
                issue.state = state;
            }
            let outcome = handle.save(issue).await?;
            println!("{} {}", saved_label(outcome.local), display_id(&outcome.issue));
            Ok(())
        }
        Command::Delete { id } => {
            let id = IssueId::new(id)?;
            // Records beyond the loaded pages can still be deleted by id.
            let issue = lookup(handle, &id)
                .await?
                .unwrap_or_else(|| Issue::default().with_id(id));
            let outcome = handle.delete(issue).await?;
            println!("{} {}", deleted_label(outcome.local), outcome.id);
            Ok(())
        }
        Command::Flush => {
            let report = handle.flush().await?;
            println!(
                "attempted {}, pushed {}, failed {}",
                report.attempted, report.succeeded, report.failed
            );
            Ok(())
        }
        Command::Watch => watch(handle).await,
        Command::Status { json } => {
            let state = handle.current();
            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print!("{}", format_status(&state));
            }
            Ok(())
        }
    }
}

/// Looks the issue up in the first page (or the cache when offline).
async fn lookup(handle: &SyncHandle, id: &IssueId) -> Result<Option<Issue>> {
    handle.load_initial().await?;
    Ok(handle.current().get(id).cloned())
}

async fn watch(handle: &SyncHandle) -> Result<()> {
    handle.load_initial().await?;
    let mut state = handle.state();
    let mut shown = state.borrow_and_update().issues.clone();
    print_issues(&handle.current(), false)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            changed = state.changed() => {
                if changed.is_err() {
                    return Err(Error::Closed);
                }
                let current = state.borrow_and_update().clone();
                if current.issues != shown {
                    println!();
                    print_issues(&current, false)?;
                    shown = current.issues;
                }
            }
        }
    }
}

fn display_id(issue: &Issue) -> String {
    issue
        .id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

fn created_label(local: bool) -> &'static str {
    if local {
        "Queued"
    } else {
        "Created"
    }
}

fn saved_label(local: bool) -> &'static str {
    if local {
        "Queued"
    } else {
        "Saved"
    }
}

fn deleted_label(local: bool) -> &'static str {
    if local {
        "Queued delete of"
    } else {
        "Deleted"
    }
}

/// One issue per line: id, state, title.
pub fn format_issue(issue: &Issue) -> String {
    let state = if issue.state.is_empty() {
        "-"
    } else {
        issue.state.as_str()
    };
    format!("{}\t{}\t{}", display_id(issue), state, issue.title)
}

fn print_issues(state: &SyncState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&state.issues)?);
        return Ok(());
    }
    if state.issues.is_empty() {
        println!("No issues");
    }
    for issue in &state.issues {
        println!("{}", format_issue(issue));
    }
    Ok(())
}

pub fn format_status(state: &SyncState) -> String {
    let connection = match (state.online, state.authenticated) {
        (true, true) => "online",
        (true, false) => "online (no token)",
        (false, _) => "offline",
    };
    let mut out = String::new();
    out.push_str(&format!("Connection: {}\n", connection));
    out.push_str(&format!(
        "Live:       {}\n",
        if state.live { "connected" } else { "disconnected" }
    ));
    out.push_str(&format!("Issues:     {}\n", state.issues.len()));
    out.push_str(&format!("Queued:     {}\n", state.pending));
    if state.is_busy() {
        out.push_str("Activity:   syncing\n");
    }
    if !state.filter.is_empty() {
        out.push_str(&format!("Filter:     {}\n", state.filter));
    }
    out
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
