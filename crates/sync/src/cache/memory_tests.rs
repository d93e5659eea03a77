// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::{Cache, MemoryCache};

#[tokio::test]
async fn get_missing_key_is_none() {
    let cache = MemoryCache::new();
    assert_eq!(cache.get("issues").await.unwrap(), None);
}

#[tokio::test]
async fn set_then_get_returns_value() {
    let cache = MemoryCache::new();
    cache.set("issues", "[]".to_string()).await.unwrap();
    assert_eq!(cache.get("issues").await.unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn set_overwrites_previous_value() {
    let cache = MemoryCache::new();
    cache.set("k", "one".to_string()).await.unwrap();
    cache.set("k", "two".to_string()).await.unwrap();
    assert_eq!(cache.peek("k").as_deref(), Some("two"));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn clones_share_storage() {
    let cache = MemoryCache::new();
    let other = cache.clone();
    cache.set("k", "v".to_string()).await.unwrap();
    assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
}

#[tokio::test]
async fn clear_removes_everything() {
    let cache = MemoryCache::new();
    cache.insert("a", "1");
    cache.insert("b", "2");
    cache.clear().await.unwrap();
    assert!(cache.is_empty());
}
