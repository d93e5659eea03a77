// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::{Cache, SqliteCache};
use tempfile::TempDir;

#[tokio::test]
async fn in_memory_roundtrip() {
    let cache = SqliteCache::open_in_memory().unwrap();
    assert_eq!(cache.get("issues").await.unwrap(), None);
    cache.set("issues", "[1]".to_string()).await.unwrap();
    assert_eq!(cache.get("issues").await.unwrap().as_deref(), Some("[1]"));
}

#[tokio::test]
async fn set_upserts_existing_key() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.set("k", "old".to_string()).await.unwrap();
    cache.set("k", "new".to_string()).await.unwrap();
    assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
}

#[tokio::test]
async fn open_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("cache.db");
    let _cache = SqliteCache::open(&path).unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache = SqliteCache::open(&path).unwrap();
        cache.set("outbox", "{}".to_string()).await.unwrap();
    }

    let cache = SqliteCache::open(&path).unwrap();
    assert_eq!(cache.get("outbox").await.unwrap().as_deref(), Some("{}"));
}

#[tokio::test]
async fn clear_empties_table() {
    let cache = SqliteCache::open_in_memory().unwrap();
    cache.set("a", "1".to_string()).await.unwrap();
    cache.set("b", "2".to_string()).await.unwrap();
    cache.clear().await.unwrap();
    assert_eq!(cache.get("a").await.unwrap(), None);
    assert_eq!(cache.get("b").await.unwrap(), None);
}
