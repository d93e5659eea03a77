// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! List queries: the pagination/filter cursor sent to the remote service.

use serde::{Deserialize, Serialize};

/// Filter text and 1-based page number of a list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Matched against issue titles by the server. Empty means no filter.
    pub filter: String,
    /// 1-based page number.
    pub page: u32,
}

impl Default for Query {
    fn default() -> Self {
        Query {
            filter: String::new(),
            page: 1,
        }
    }
}

impl Query {
    /// First page for the given filter.
    pub fn first(filter: impl Into<String>) -> Self {
        Query {
            filter: filter.into(),
            page: 1,
        }
    }

    /// The page after this one, same filter.
    pub fn next(&self) -> Self {
        Query {
            filter: self.filter.clone(),
            page: self.page.saturating_add(1),
        }
    }

    /// True when results replace the snapshot instead of appending to it.
    pub fn is_first_page(&self) -> bool {
        self.page <= 1
    }

    /// Query-string pairs: `title` (only when filtering) and `page`.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(2);
        if !self.filter.is_empty() {
            pairs.push(("title", self.filter.clone()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
