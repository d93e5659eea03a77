// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::store::{self, ISSUES_KEY, OUTBOX_KEY};
use super::MemoryCache;
use crate::sync::outbox::Outbox;
use issync_core::{Issue, IssueId, Snapshot};

fn issue(id: &str, title: &str) -> Issue {
    Issue::new(title).with_id(IssueId::new(id).unwrap())
}

#[tokio::test]
async fn absent_snapshot_is_miss() {
    let cache = MemoryCache::new();
    assert!(store::load_snapshot(&cache).await.is_none());
}

#[tokio::test]
async fn snapshot_persists_as_json_array() {
    let cache = MemoryCache::new();
    let snapshot = Snapshot::from_issues(vec![issue("a", "A"), issue("b", "B")]);
    store::save_snapshot(&cache, &snapshot).await.unwrap();

    let raw: serde_json::Value = serde_json::from_str(&cache.peek(ISSUES_KEY).unwrap()).unwrap();
    assert!(raw.is_array());
    assert_eq!(raw[0]["_id"], "a");

    let loaded = store::load_snapshot(&cache).await.unwrap();
    assert_eq!(loaded, snapshot);
}

#[yare::parameterized(
    not_json = { "not json" },
    wrong_shape = { r#"{"issues": 3}"# },
    truncated = { r#"[{"_id": "a", "title""# },
)]
fn malformed_snapshot_is_miss(raw: &str) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let cache = MemoryCache::new();
        cache.insert(ISSUES_KEY, raw);
        assert!(store::load_snapshot(&cache).await.is_none());
    });
}

#[tokio::test]
async fn absent_outbox_is_empty() {
    let cache = MemoryCache::new();
    assert!(store::load_outbox(&cache).await.is_empty());
}

#[tokio::test]
async fn malformed_outbox_is_empty() {
    let cache = MemoryCache::new();
    cache.insert(OUTBOX_KEY, "[[[");
    assert!(store::load_outbox(&cache).await.is_empty());
}

#[tokio::test]
async fn outbox_survives_roundtrip() {
    let cache = MemoryCache::new();
    let mut outbox = Outbox::new();
    outbox.record_upsert(issue("local-1", "draft")).unwrap();
    outbox.record_delete(IssueId::new("srv-9").unwrap());
    store::save_outbox(&cache, &outbox).await.unwrap();

    let loaded = store::load_outbox(&cache).await;
    assert_eq!(loaded, outbox);
    assert_eq!(loaded.len(), 2);
}
