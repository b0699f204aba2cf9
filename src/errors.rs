// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the vcluster engine.
//!
//! This module provides the error taxonomy shared by every layer:
//! - Transport failures (network-level, before any HTTP status)
//! - Status failures (non-success HTTP responses)
//! - Locally recovered categories that still surface once their budget is spent
//!   (retry exhaustion, convergence timeout)
//! - Caller errors (immutable-field changes, malformed identifiers, bad configuration)
//! - Cancellation
//!
//! Every variant renders a human-readable message carrying enough context
//! (target, status, body excerpt, key) to diagnose a failure without retrying blindly.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Network-level categories that are considered transient.
///
/// A transport error is retryable iff its rendered message matches one of these
/// categories. Anything else (TLS configuration, invalid URL, body errors) is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientCategory {
    /// Peer reset the connection
    ConnectionReset,
    /// Nothing listening on the remote port
    ConnectionRefused,
    /// Connect or read timeout
    Timeout,
    /// DNS lookup failure
    NameResolution,
    /// Unexpected stream termination or other transient I/O failure
    TransientIo,
}

impl TransientCategory {
    const PATTERNS: &'static [(&'static str, TransientCategory)] = &[
        ("connection reset", TransientCategory::ConnectionReset),
        ("connection refused", TransientCategory::ConnectionRefused),
        ("timeout", TransientCategory::Timeout),
        ("timed out", TransientCategory::Timeout),
        ("no such host", TransientCategory::NameResolution),
        ("dns error", TransientCategory::NameResolution),
        ("failed to lookup address", TransientCategory::NameResolution),
        ("name or service not known", TransientCategory::NameResolution),
        ("temporary failure", TransientCategory::NameResolution),
        ("network is unreachable", TransientCategory::TransientIo),
        ("eof", TransientCategory::TransientIo),
        ("unexpected end", TransientCategory::TransientIo),
        ("connection closed", TransientCategory::TransientIo),
        ("broken pipe", TransientCategory::TransientIo),
        ("connect error", TransientCategory::TransientIo),
    ];

    /// Classify a transport error message, case-insensitively.
    #[must_use]
    pub fn classify(message: &str) -> Option<Self> {
        let lowered = message.to_lowercase();
        Self::PATTERNS
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern))
            .map(|(_, category)| *category)
    }
}

/// A failure raised by the transport before an HTTP status was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// Full rendered message, including the source chain
    pub message: String,
}

impl TransportError {
    /// Create a transport error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Render an error and its whole source chain into one transport error.
    ///
    /// HTTP clients usually wrap the interesting part ("connection refused")
    /// several levels deep, so the chain is flattened before classification.
    pub fn from_chain(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Self { message }
    }

    /// Convert a `reqwest` error for classification.
    ///
    /// The request URL is stripped first so that path text never decides
    /// retryability; the caller already records the target separately. Timeouts
    /// and connect failures are recognized from reqwest's own predicates.
    #[must_use]
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let timed_out = err.is_timeout();
        let connect = err.is_connect();
        let err = err.without_url();
        let mut error = Self::from_chain(&err);
        if error.category().is_none() {
            if timed_out {
                error.message = format!("request timed out: {}", error.message);
            } else if connect {
                error.message = format!("connect error: {}", error.message);
            }
        }
        error
    }

    /// The transient category of this error, if any.
    #[must_use]
    pub fn category(&self) -> Option<TransientCategory> {
        TransientCategory::classify(&self.message)
    }

    /// Whether the retry executor may retry after this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_some()
    }
}

/// One failed item of a cleanup batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Name of the item that failed
    pub name: String,
    /// Rendered error for that item
    pub message: String,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to delete app {}: {}", self.name, self.message)
    }
}

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Network-level failure that was not retried (or not retryable)
    #[error("request to {target} failed: {source}")]
    Transport {
        /// Method and URL of the failed request
        target: String,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// Non-success HTTP status returned to the caller
    #[error("{target} failed: {status} {reason}: {body}")]
    Status {
        /// Method and URL of the failed request
        target: String,
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase for the status
        reason: String,
        /// Response body excerpt
        body: String,
    },

    /// A retryable failure persisted through the whole attempt budget
    #[error("max retries exceeded for {target} after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Method and URL of the failed request
        target: String,
        /// Number of requests issued
        attempts: u32,
        /// The last retryable failure
        #[source]
        source: Box<Error>,
    },

    /// The resource never reported the terminal-success marker
    #[error("{kind} {key} did not become Healthy within {attempts} polls; last known status: {last_status}")]
    ConvergenceTimeout {
        /// Resource kind
        kind: &'static str,
        /// Natural key that was polled
        key: String,
        /// Number of polls issued
        attempts: u32,
        /// Last status observed verbatim (empty when nothing was observed)
        last_status: String,
    },

    /// The operation was cancelled or its deadline expired
    #[error("operation cancelled while {during}")]
    Cancelled {
        /// The suspension point that observed the cancellation
        during: &'static str,
    },

    /// An update attempted to change a field that requires recreation
    #[error("cannot change {} on {kind}; these require recreation", .fields.join(", "))]
    ImmutableField {
        /// Resource kind
        kind: &'static str,
        /// Names of the changed immutable fields
        fields: Vec<&'static str>,
    },

    /// An opaque identifier could not be decoded
    #[error("malformed identifier '{id}': {reason}")]
    MalformedIdentifier {
        /// The offending identifier
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// Some items of a cleanup batch failed
    #[error("{}", render_partial_batch(.cluster, .deleted, .failures))]
    PartialBatch {
        /// Cluster the batch ran against
        cluster: String,
        /// Names deleted successfully
        deleted: Vec<String>,
        /// Per-item failures
        failures: Vec<BatchFailure>,
    },

    /// A resource that must exist was not found
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Resource kind
        kind: &'static str,
        /// Natural key that was looked up
        key: String,
    },

    /// A required input field is empty
    #[error("{kind} {field} is required")]
    MissingField {
        /// Resource kind
        kind: &'static str,
        /// Missing field name
        field: &'static str,
    },

    /// A response body could not be decoded
    #[error("failed to decode response from {target}: {source}")]
    Decode {
        /// Method and URL of the request
        target: String,
        /// JSON decoding failure
        #[source]
        source: serde_json::Error,
    },

    /// A request could not be built (bad URL, bad header, unserializable body)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Login failed or returned no token
    #[error("login failed: {0}")]
    Login(String),

    /// Invalid provider configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A Helm values file could not be read
    #[error("failed to read values file {}: {source}", .path.display())]
    ValuesFile {
        /// Path of the values file
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this error represents cancellation of the operation.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// The HTTP status behind this error, looking through retry exhaustion.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::RetriesExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// Whether this error is a not-found status (HTTP 404).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// Short category label for metrics.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Error::Transport { .. } => "transport",
            Error::Status { .. } => "status",
            Error::RetriesExhausted { .. } => "retries_exhausted",
            Error::ConvergenceTimeout { .. } => "convergence_timeout",
            Error::Cancelled { .. } => "cancelled",
            Error::ImmutableField { .. } => "immutable_field",
            Error::MalformedIdentifier { .. } => "malformed_identifier",
            Error::PartialBatch { .. } => "partial_batch",
            Error::NotFound { .. } => "not_found",
            Error::MissingField { .. } => "missing_field",
            Error::Decode { .. } => "decode",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Login(_) => "login",
            Error::Config(_) => "config",
            Error::ValuesFile { .. } => "values_file",
        }
    }
}

fn render_partial_batch(cluster: &str, deleted: &[String], failures: &[BatchFailure]) -> String {
    let rendered: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!(
        "orphan cleanup for cluster {cluster} failed for {} of {} apps: {}",
        failures.len(),
        failures.len() + deleted.len(),
        rendered.join("; ")
    )
}

/// Build a status error from a raw response body, truncating long bodies.
#[must_use]
pub fn status_error(target: &str, status: reqwest::StatusCode, body: &[u8]) -> Error {
    Error::Status {
        target: target.to_string(),
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        body: body_excerpt(body),
    }
}

/// Render a response body for an error message.
#[must_use]
pub fn body_excerpt(body: &[u8]) -> String {
    use crate::constants::{EMPTY_BODY_PLACEHOLDER, ERROR_BODY_EXCERPT_BYTES};

    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return EMPTY_BODY_PLACEHOLDER.to_string();
    }
    if trimmed.len() <= ERROR_BODY_EXCERPT_BYTES {
        return trimmed.to_string();
    }
    let mut end = ERROR_BODY_EXCERPT_BYTES;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
