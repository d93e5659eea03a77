// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted layout of synchronizer state.
//!
//! Two entries:
//! - `"issues"`: the snapshot as a JSON array of issues
//! - `"outbox"`: mutations recorded locally and not yet confirmed remotely
//!
//! Reads never fail: an absent, unreadable, or unparsable entry is a miss.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use issync_core::Snapshot;

use super::{Cache, CacheResult};
use crate::error::Result;
use crate::sync::outbox::Outbox;

/// Cache key of the snapshot.
pub const ISSUES_KEY: &str = "issues";
/// Cache key of the outbox.
pub const OUTBOX_KEY: &str = "outbox";

async fn load_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "cache read failed, treating as miss");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "malformed cache entry, treating as miss");
            None
        }
    }
}

async fn store_json<T: Serialize>(cache: &dyn Cache, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    let stored: CacheResult<()> = cache.set(key, json).await;
    stored?;
    Ok(())
}

/// Loads the last persisted snapshot, or `None` on a miss.
pub async fn load_snapshot(cache: &dyn Cache) -> Option<Snapshot> {
    load_json(cache, ISSUES_KEY).await
}

/// Persists the snapshot.
pub async fn save_snapshot(cache: &dyn Cache, snapshot: &Snapshot) -> Result<()> {
    store_json(cache, ISSUES_KEY, snapshot).await
}

/// Loads the persisted outbox; a miss is an empty outbox.
pub async fn load_outbox(cache: &dyn Cache) -> Outbox {
    load_json(cache, OUTBOX_KEY).await.unwrap_or_default()
}

/// Persists the outbox.
pub async fn save_outbox(cache: &dyn Cache, outbox: &Outbox) -> Result<()> {
    store_json(cache, OUTBOX_KEY, outbox).await
}
