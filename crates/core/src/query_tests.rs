// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_is_unfiltered_first_page() {
    let query = Query::default();
    assert_eq!(query.page, 1);
    assert!(query.filter.is_empty());
    assert!(query.is_first_page());
}

#[test]
fn next_keeps_filter() {
    let query = Query::first("bug").next().next();
    assert_eq!(query.page, 3);
    assert_eq!(query.filter, "bug");
    assert!(!query.is_first_page());
}

#[test]
fn pairs_without_filter() {
    assert_eq!(Query::default().pairs(), vec![("page", "1".to_string())]);
}

#[test]
fn pairs_with_filter() {
    let query = Query::first("login page").next();
    assert_eq!(
        query.pairs(),
        vec![("title", "login page".to_string()), ("page", "2".to_string())]
    );
}
