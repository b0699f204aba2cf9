// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operation templates and idempotent request bodies.
//!
//! An [`Operation`] is a template: method, URL, headers, a first-send body and an
//! optional [`BodySupplier`]. The retry executor materializes a fresh
//! [`HttpRequest`] from the template for every attempt instead of mutating one
//! request in place. [`IdempotentRequestBuilder`] captures a body once and installs
//! a supplier that replays the same bytes on every attempt.
//!
//! # Example
//!
//! ```rust
//! use reqwest::Method;
//! use url::Url;
//! use vcluster_engine::operation::IdempotentRequestBuilder;
//!
//! let url = Url::parse("http://api.local/createcluster").unwrap();
//! let mut op = IdempotentRequestBuilder::new(Method::POST, url)
//!     .json(&serde_json::json!({"Name": "prod"}))
//!     .unwrap()
//!     .build();
//!
//! let first = op.materialize(0);
//! let retry = op.materialize(1);
//! assert_eq!(first.body, retry.body);
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use url::Url;

use crate::errors::{Error, Result};
use crate::transport::HttpRequest;

/// Produces a fresh, byte-identical copy of a request body on every call.
pub type BodySupplier = Arc<dyn Fn() -> Vec<u8> + Send + Sync>;

/// Template for one logical outbound call.
#[derive(Clone)]
pub struct Operation {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    body_supplier: Option<BodySupplier>,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("has_body", &self.body.is_some())
            .field("has_body_supplier", &self.body_supplier.is_some())
            .finish()
    }
}

impl Operation {
    /// Create a body-less operation.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            body_supplier: None,
        }
    }

    /// Set a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a body that can only be sent once.
    ///
    /// Without a supplier, retries go out with an empty body. Callers that may be
    /// retried should go through [`IdempotentRequestBuilder`] or call
    /// [`Operation::make_idempotent`].
    #[must_use]
    pub fn with_one_shot_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self.body_supplier = None;
        self
    }

    /// Install a replayable body from a captured buffer, restoring the first-send
    /// body from the same bytes.
    #[must_use]
    pub fn make_idempotent(mut self) -> Self {
        if self.body_supplier.is_some() {
            return self;
        }
        if let Some(body) = self.body.take() {
            let captured: Arc<[u8]> = Arc::from(body);
            self.body = Some(captured.to_vec());
            self.body_supplier = Some(Arc::new(move || captured.to_vec()));
        }
        self
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether retries can replay the body.
    #[must_use]
    pub fn has_body_supplier(&self) -> bool {
        self.body_supplier.is_some()
    }

    /// Produce a fresh copy of the body from the supplier, if one is installed.
    #[must_use]
    pub fn supply_body(&self) -> Option<Vec<u8>> {
        self.body_supplier.as_ref().map(|supplier| supplier())
    }

    /// Render `METHOD url` for logs and error messages.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Materialize the request for attempt `attempt` (0 is the initial send).
    ///
    /// The initial send consumes the first-send body; every later attempt derives
    /// a fresh body from the supplier, or sends no body if none is installed.
    pub fn materialize(&mut self, attempt: u32) -> HttpRequest {
        let body = if attempt == 0 {
            self.body.take().or_else(|| self.supply_body())
        } else {
            self.supply_body()
        };

        HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
        }
    }
}

/// Builds an [`Operation`] whose body is captured once and replayed verbatim.
#[derive(Debug)]
pub struct IdempotentRequestBuilder {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Arc<[u8]>>,
}

impl IdempotentRequestBuilder {
    /// Start a builder for `method url`.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Set a header from a typed value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the `Accept` header.
    #[must_use]
    pub fn accept(self, value: &'static str) -> Self {
        self.header(ACCEPT, HeaderValue::from_static(value))
    }

    /// Set the `Authorization` header; an empty value leaves it unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the value contains bytes not allowed in
    /// a header.
    pub fn authorization(mut self, value: &str) -> Result<Self> {
        if value.is_empty() {
            return Ok(self);
        }
        let mut header = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidRequest(format!("invalid Authorization header: {e}")))?;
        header.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, header);
        Ok(self)
    }

    /// Serialize `payload` as the JSON body and set `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| Error::InvalidRequest(format!("failed to serialize body: {e}")))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Arc::from(bytes));
        Ok(self)
    }

    /// Capture a single-read body stream once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if reading the stream fails.
    pub fn body_reader<R: Read>(mut self, mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| Error::InvalidRequest(format!("failed to read request body: {e}")))?;
        self.body = Some(Arc::from(bytes));
        Ok(self)
    }

    /// Finish the template.
    #[must_use]
    pub fn build(self) -> Operation {
        let mut operation = Operation {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: None,
            body_supplier: None,
        };
        if let Some(captured) = self.body {
            operation.body = Some(captured.to_vec());
            operation.body_supplier = Some(Arc::new(move || captured.to_vec()));
        }
        operation
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod operation_tests;
