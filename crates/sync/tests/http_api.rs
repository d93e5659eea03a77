// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! REST client against a one-shot in-process HTTP responder.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use issync::{HttpIssueApi, Issue, IssueApi, IssueId, Query, RemoteError};

/// What the responder saw.
struct Request {
    head: String,
    body: String,
}

impl Request {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Serves exactly one request with `status` and `body`.
async fn respond_once(status: &str, body: &str) -> (String, oneshot::Receiver<Request>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        let head_end = loop {
            let n = stream.read(&mut buf).await.unwrap();
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
            if n == 0 {
                break raw.len();
            }
        };
        let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
        let length = head
            .lines()
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        let body_start = (head_end + 4).min(raw.len());
        while raw.len() < body_start + length {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        let body = String::from_utf8_lossy(&raw[body_start..]).to_string();

        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
        let _ = tx.send(Request { head, body });
    });

    (base, rx)
}

fn client(base: &str) -> HttpIssueApi {
    HttpIssueApi::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn list_sends_query_and_bearer_token() {
    let (base, seen) = respond_once(
        "200 OK",
        r#"[{"_id":"srv-1","title":"bug: crash","state":"open"},{"_id":"srv-2","title":"bug: typo"}]"#,
    )
    .await;

    let issues = client(&base)
        .list("tok", &Query::first("bug"))
        .await
        .unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].id, Some(IssueId::new("srv-1").unwrap()));
    assert_eq!(issues[0].state, "open");

    let request = seen.await.unwrap();
    assert_eq!(request.request_line(), "GET /api/issue?title=bug&page=1 HTTP/1.1");
    assert_eq!(request.header("authorization"), Some("Bearer tok"));
}

#[tokio::test]
async fn create_posts_issue_without_id() {
    let (base, seen) = respond_once("201 Created", r#"{"_id":"srv-5","title":"new"}"#).await;

    let draft = Issue::new("new").with_id(IssueId::new("local-1").unwrap());
    let created = client(&base).create("tok", &draft).await.unwrap();
    assert_eq!(created.id, Some(IssueId::new("srv-5").unwrap()));

    let request = seen.await.unwrap();
    assert!(request.request_line().starts_with("POST /api/issue "));
    assert_eq!(request.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert!(body.get("_id").is_none());
    assert_eq!(body["title"], "new");
}

#[tokio::test]
async fn update_puts_to_item_url() {
    let (base, seen) = respond_once("200 OK", r#"{"title":"renamed"}"#).await;

    let issue = Issue::new("renamed").with_id(IssueId::new("srv-3").unwrap());
    let updated = client(&base).update("tok", &issue).await.unwrap();
    assert_eq!(updated.id, Some(IssueId::new("srv-3").unwrap()));

    let request = seen.await.unwrap();
    assert!(request.request_line().starts_with("PUT /api/issue/srv-3 "));
}

#[tokio::test]
async fn delete_accepts_empty_body() {
    let (base, seen) = respond_once("204 No Content", "").await;

    let issue = Issue::new("gone").with_id(IssueId::new("srv-4").unwrap());
    let deleted = client(&base).delete("tok", &issue).await.unwrap();
    assert_eq!(deleted, issue);

    let request = seen.await.unwrap();
    assert!(request.request_line().starts_with("DELETE /api/issue/srv-4 "));
}

#[tokio::test]
async fn error_status_is_a_rejection() {
    let (base, _seen) = respond_once("404 Not Found", r#"{"error":"no such issue"}"#).await;

    let issue = Issue::new("x").with_id(IssueId::new("srv-9").unwrap());
    let err = client(&base).update("tok", &issue).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, RemoteError::Rejected { status: 404, ref message } if message.contains("no such issue")));
}

#[tokio::test]
async fn unparsable_body_is_a_decode_error() {
    let (base, _seen) = respond_once("200 OK", "<html>").await;

    let err = client(&base)
        .list("tok", &Query::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Decode(_)));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&base)
        .list("tok", &Query::default())
        .await
        .unwrap_err();
    assert!(err.is_transport());
}
