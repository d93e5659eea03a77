// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! REST client for the issue service.
//!
//! Routes:
//! - `GET    {base}/api/issue?title=..&page=..`
//! - `POST   {base}/api/issue`
//! - `PUT    {base}/api/issue/{id}`
//! - `DELETE {base}/api/issue/{id}`

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use issync_core::{Issue, IssueId, Query};

use super::{IssueApi, RemoteError, RemoteResult};

/// [`IssueApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIssueApi {
    http_client: reqwest::Client,
    issues_url: String,
}

impl HttpIssueApi {
    /// Creates a client for the service rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> RemoteResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            issues_url: format!("{}/api/issue", base_url.trim_end_matches('/')),
        })
    }

    /// The collection URL, `{base}/api/issue`.
    pub fn issues_url(&self) -> &str {
        &self.issues_url
    }

    fn item_url(&self, id: &IssueId) -> String {
        format!("{}/{}", self.issues_url, id)
    }

    async fn send(&self, request: RequestBuilder, token: &str) -> RemoteResult<Response> {
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        token: &str,
    ) -> RemoteResult<T> {
        let response = self.send(request, token).await?;
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(format!("failed to read response: {}", e)))?;
        serde_json::from_str(&body)
            .map_err(|e| RemoteError::Decode(format!("failed to parse response: {}", e)))
    }
}

/// Request body for create/update: the issue without its id.
fn body(issue: &Issue) -> Issue {
    Issue {
        id: None,
        ..issue.clone()
    }
}

impl IssueApi for HttpIssueApi {
    fn list<'a>(&'a self, token: &'a str, query: &'a Query) -> BoxFuture<'a, RemoteResult<Vec<Issue>>> {
        Box::pin(async move {
            debug!(filter = %query.filter, page = query.page, "listing issues");
            let request = self.http_client.get(&self.issues_url).query(&query.pairs());
            self.send_json(request, token).await
        })
    }

    fn create<'a>(&'a self, token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            let request = self.http_client.post(&self.issues_url).json(&body(issue));
            self.send_json(request, token).await
        })
    }

    fn update<'a>(&'a self, token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            let id = issue
                .id
                .as_ref()
                .ok_or_else(|| RemoteError::Decode("cannot update an issue without id".into()))?;
            let request = self.http_client.put(self.item_url(id)).json(&body(issue));
            let mut updated: Issue = self.send_json(request, token).await?;
            if updated.id.is_none() {
                updated.id = Some(id.clone());
            }
            Ok(updated)
        })
    }

    fn delete<'a>(&'a self, token: &'a str, issue: &'a Issue) -> BoxFuture<'a, RemoteResult<Issue>> {
        Box::pin(async move {
            let id = issue
                .id
                .as_ref()
                .ok_or_else(|| RemoteError::Decode("cannot delete an issue without id".into()))?;
            let response = self
                .send(self.http_client.delete(self.item_url(id)), token)
                .await?;
            // Servers may answer with the deleted document or with nothing.
            let text = response.text().await.unwrap_or_default();
            match serde_json::from_str::<Issue>(&text) {
                Ok(deleted) if deleted.id.is_some() => Ok(deleted),
                _ => Ok(issue.clone()),
            }
        })
    }
}
