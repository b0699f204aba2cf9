// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Single outbound HTTP call.
//!
//! The [`Transport`] trait owns nothing about retries: it sends one fully
//! materialized [`HttpRequest`] and returns either an [`HttpResponse`] or a
//! [`TransportError`]. Response bodies are streamed lazily behind
//! [`ResponseBody`] so callers that discard a response can drain it explicitly,
//! which lets the underlying connection return to the pool.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::constants::{HTTP_CONNECT_TIMEOUT_SECS, HTTP_POOL_IDLE_TIMEOUT_SECS};
use crate::errors::{Error, Result, TransportError};

/// One materialized request, ready to be sent exactly once.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute target URL
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body bytes, if any
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Render `METHOD url` for logs and error messages.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// A response body that can be read (or drained) exactly once.
#[async_trait]
pub trait ResponseBody: Send {
    /// Read the remaining body to the end.
    async fn read_all(self: Box<Self>) -> std::result::Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl ResponseBody for reqwest::Response {
    async fn read_all(self: Box<Self>) -> std::result::Result<Vec<u8>, TransportError> {
        self.bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(TransportError::from_reqwest)
    }
}

#[async_trait]
impl ResponseBody for Vec<u8> {
    async fn read_all(self: Box<Self>) -> std::result::Result<Vec<u8>, TransportError> {
        Ok(*self)
    }
}

/// Status plus a not-yet-read body.
pub struct HttpResponse {
    status: StatusCode,
    body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// Wrap a status and a lazily read body.
    pub fn new(status: StatusCode, body: impl ResponseBody + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    /// Build a response whose body is already in memory.
    pub fn buffered(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, body.into())
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Read the body to the end.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the stream fails mid-body.
    pub async fn bytes(self) -> std::result::Result<Vec<u8>, TransportError> {
        self.body.read_all().await
    }

    /// Read the body as (lossy) UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the stream fails mid-body.
    pub async fn text(self, target: &str) -> Result<String> {
        let bytes = self.bytes().await.map_err(|source| Error::Transport {
            target: target.to_string(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if reading fails or [`Error::Decode`] if the
    /// body is not valid JSON for `T`.
    pub async fn json<T: DeserializeOwned>(self, target: &str) -> Result<T> {
        let bytes = self.bytes().await.map_err(|source| Error::Transport {
            target: target.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
            target: target.to_string(),
            source,
        })
    }

    /// Read and discard the rest of the body.
    ///
    /// Read errors are ignored: the response is being thrown away either way.
    pub async fn drain(self) {
        let _ = self.body.read_all().await;
    }

    /// Turn a non-success response into [`Error::Status`], consuming the body.
    pub async fn into_status_error(self, target: &str) -> Error {
        let status = self.status;
        let body = self.bytes().await.unwrap_or_default();
        crate::errors::status_error(target, status, &body)
    }
}

/// Sends one HTTP request.
///
/// Implementations must be safe for concurrent use; a single transport is shared
/// by every operation of a configured client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` once.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no HTTP status was received.
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given overall request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be constructed
    /// (e.g. the TLS backend fails to initialize).
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;
        let status = response.status();
        Ok(HttpResponse::new(status, response))
    }
}
