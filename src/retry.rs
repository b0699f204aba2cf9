// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for control-plane API calls.
//!
//! This module provides the [`RetryExecutor`], the unit every higher-level operation
//! goes through. It retries transient failures (HTTP 429, 5xx and network-level
//! errors such as connection resets) with capped exponential backoff, and fails fast
//! on everything else.

use reqwest::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MILLIS, DEFAULT_MAX_DELAY_SECS,
    DEFAULT_MAX_RETRIES,
};
use crate::errors::{status_error, Error, Result};
use crate::metrics;
use crate::operation::Operation;
use crate::transport::{HttpResponse, Transport};
use crate::wait;

/// Bounded retry policy.
///
/// The delay before retry *n* (0-based) is `min(initial_delay × multiplier^n, max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Backoff multiplier (must be greater than 1)
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    /// Default retry policy.
    ///
    /// # Configuration
    ///
    /// - **Retries**: 3 (4 requests in total)
    /// - **Initial delay**: 1 second
    /// - **Max delay**: 30 seconds
    /// - **Multiplier**: 2.0
    ///
    /// # Retry Schedule
    ///
    /// 1s, 2s, 4s, 8s, 16s, 30s, 30s, ... (capped at max delay)
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MILLIS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Create a validated policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `multiplier <= 1` or `initial_delay > max_delay`.
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Result<Self> {
        if !multiplier.is_finite() || multiplier <= 1.0 {
            return Err(Error::Config(format!(
                "backoff multiplier must be greater than 1, got {multiplier}"
            )));
        }
        if initial_delay > max_delay {
            return Err(Error::Config(format!(
                "initial retry delay {initial_delay:?} exceeds max delay {max_delay:?}"
            )));
        }
        Ok(Self {
            max_retries,
            initial_delay,
            max_delay,
            multiplier,
        })
    }

    /// Default policy with a different retry budget.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Total number of requests the executor may issue.
    #[must_use]
    pub fn max_requests(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `n` (0-based), capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, n: u32) -> Duration {
        let exponent = i32::try_from(n).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Start a backoff sequence for this policy.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff {
            current_interval: self.initial_delay,
            max_interval: self.max_delay,
            multiplier: self.multiplier,
        }
    }
}

/// Capped exponential backoff sequence.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Interval returned by the next call
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
}

impl Backoff {
    /// Return the current interval and advance to the next one.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = if next.is_finite() {
            Duration::from_secs_f64(next).min(self.max_interval)
        } else {
            self.max_interval
        };
        interval
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_backoff())
    }
}

/// Determine if an HTTP status code is retryable.
///
/// # Retryable Status Codes
///
/// - **429** (Too Many Requests) - Rate limiting
/// - **500-599** - Any server error
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Wraps a [`Transport`] with bounded retry and exponential backoff.
#[derive(Clone)]
pub struct RetryExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryExecutor {
    /// Create an executor over a shared transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// The (immutable) retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation`, retrying transient failures.
    ///
    /// Issues at most `max_retries + 1` requests. Retryable responses are drained
    /// before the next attempt. Non-retryable responses (2xx-4xx except 429) are
    /// returned unread for the caller to interpret.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] for a non-retryable network failure
    /// - [`Error::RetriesExhausted`] when every attempt failed transiently
    /// - [`Error::Cancelled`] when `cancel` fires during a send or a backoff
    pub async fn execute(
        &self,
        mut operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let target = operation.target();
        let method = operation.method().to_string();
        let max_requests = self.policy.max_requests();
        let mut backoff = self.policy.backoff();
        let start_time = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            wait::check(cancel, "sending request")?;
            let request = operation.materialize(attempt);
            attempt += 1;

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(Error::Cancelled { during: "awaiting response" });
                }
                result = self.transport.send(request) => result,
            };

            let failure = match result {
                Ok(response) if !is_retryable_http_status(response.status()) => {
                    if attempt > 1 {
                        debug!(
                            request = %target,
                            attempt = attempt,
                            elapsed = ?start_time.elapsed(),
                            status = %response.status(),
                            "HTTP API call succeeded after retries"
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status();
                    // Reading to the end drains the connection for reuse.
                    let body = tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return Err(Error::Cancelled { during: "draining response" });
                        }
                        body = response.bytes() => body.unwrap_or_default(),
                    };
                    status_error(&target, status, &body)
                }
                Err(source) if source.is_retryable() => Error::Transport {
                    target: target.clone(),
                    source,
                },
                Err(source) => {
                    error!(
                        request = %target,
                        attempt = attempt,
                        error = %source,
                        "Non-retryable transport error, failing immediately"
                    );
                    return Err(Error::Transport {
                        target: target.clone(),
                        source,
                    });
                }
            };

            if attempt >= max_requests {
                error!(
                    request = %target,
                    attempt = attempt,
                    elapsed = ?start_time.elapsed(),
                    error = %failure,
                    "Retries exhausted, giving up"
                );
                return Err(Error::RetriesExhausted {
                    target,
                    attempts: attempt,
                    source: Box::new(failure),
                });
            }

            let delay = backoff.next_backoff();
            warn!(
                request = %target,
                attempt = attempt,
                max_retries = self.policy.max_retries,
                retry_after = ?delay,
                error = %failure,
                "Retryable HTTP API error, will retry"
            );
            metrics::record_http_retry(&method);
            wait::wait(delay, cancel, "waiting for retry backoff").await?;
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
