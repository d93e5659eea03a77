// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use super::{Cache, CacheError, CacheResult};

/// Process-local cache. Contents are lost on exit.
///
/// Clones share the same storage, so a test can keep a clone to inspect what
/// the synchronizer persisted, or hand a clone to a second synchronizer to
/// simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored value without going through the async interface.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.data.lock().ok().and_then(|map| map.get(key).cloned())
    }

    /// Stores a value without going through the async interface.
    pub fn insert(&self, key: &str, value: impl Into<String>) {
        if let Ok(mut map) = self.data.lock() {
            map.insert(key.to_string(), value.into());
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, CacheResult<Option<String>>> {
        Box::pin(async move {
            let map = self.data.lock().map_err(|_| CacheError::Poisoned)?;
            Ok(map.get(key).cloned())
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, CacheResult<()>> {
        Box::pin(async move {
            let mut map = self.data.lock().map_err(|_| CacheError::Poisoned)?;
            map.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, CacheResult<()>> {
        Box::pin(async move {
            let mut map = self.data.lock().map_err(|_| CacheError::Poisoned)?;
            map.clear();
            Ok(())
        })
    }
}
