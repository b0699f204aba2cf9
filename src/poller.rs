// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Poll-until-converged loop for asynchronously provisioned resources.
//!
//! After a create call is accepted, the remote resource moves through lifecycle
//! statuses on its own. The [`ConvergencePoller`] re-reads it at a fixed interval
//! until it reports the terminal-success marker.
//!
//! # State Machine
//!
//! ```text
//! Submitted -> Polling -> Converged   (status == marker)
//!                      -> TimedOut    (attempts exhausted, last status reported)
//!                      -> Failed      (one poll errored: logged, polling continues)
//! ```
//!
//! A failed observation is never fatal on its own; only cancellation aborts the
//! loop early.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS, STATUS_HEALTHY};
use crate::errors::{Error, Result};
use crate::handle::ResourceHandle;
use crate::metrics;
use crate::wait;

/// Observed state that reports a free-form lifecycle status.
pub trait LifecycleStatus {
    /// The lifecycle status string as reported by the remote API.
    fn lifecycle_status(&self) -> &str;
}

/// Phases of the convergence state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Create accepted, no poll issued yet
    Submitted,
    /// Polling in progress
    Polling,
    /// Terminal-success marker observed
    Converged,
    /// Attempts exhausted without the marker
    TimedOut,
    /// A single poll failed; treated as a missed observation
    Failed,
}

/// Terminal snapshot of a converged resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Converged<S> {
    /// State observed on the converging poll
    pub state: S,
    /// Number of polls issued, including the converging one
    pub attempts: u32,
}

/// Fixed-interval, bounded poller.
#[derive(Debug, Clone)]
pub struct ConvergencePoller {
    interval: Duration,
    max_attempts: u32,
    marker: String,
}

impl Default for ConvergencePoller {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            DEFAULT_POLL_MAX_ATTEMPTS,
        )
    }
}

impl ConvergencePoller {
    /// Create a poller waiting for [`STATUS_HEALTHY`].
    ///
    /// At least one poll is always issued.
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            marker: STATUS_HEALTHY.to_string(),
        }
    }

    /// Override the terminal-success marker.
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Interval between polls.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum number of polls.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether `status` is the terminal-success marker.
    #[must_use]
    pub fn is_converged(&self, status: &str) -> bool {
        status == self.marker
    }

    /// Poll `observe` until the observed status equals the marker.
    ///
    /// Every successful observation replaces the snapshot held by `handle`,
    /// whether or not it converged. `observe` returns `Ok(None)` while the resource
    /// is not yet visible.
    ///
    /// # Errors
    ///
    /// - [`Error::ConvergenceTimeout`] with the last observed status when all
    ///   attempts are spent
    /// - [`Error::Cancelled`] when `cancel` fires during a poll or an interval
    pub async fn poll_until_converged<S, F, Fut>(
        &self,
        kind: &'static str,
        key: &str,
        handle: &mut ResourceHandle<S>,
        mut observe: F,
        cancel: &CancellationToken,
    ) -> Result<Converged<S>>
    where
        S: LifecycleStatus + Clone,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<S>>>,
    {
        let mut phase = PollPhase::Submitted;
        let mut last_status = String::new();
        debug!(kind, key, phase = ?phase, max_attempts = self.max_attempts, "Waiting for convergence");

        for attempt in 1..=self.max_attempts {
            phase = PollPhase::Polling;

            let observation = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(Error::Cancelled { during: "polling for convergence" }),
                observation = observe() => observation,
            };

            match observation {
                Ok(Some(state)) => {
                    let status = state.lifecycle_status().to_string();
                    info!(kind, key, attempt, status = %status, "Observed status");
                    handle.observe(state.clone());

                    if self.is_converged(&status) {
                        phase = PollPhase::Converged;
                        metrics::record_convergence_poll("converged");
                        debug!(kind, key, attempt, phase = ?phase, "Resource converged");
                        return Ok(Converged {
                            state,
                            attempts: attempt,
                        });
                    }
                    metrics::record_convergence_poll("pending");
                    last_status = status;
                }
                Ok(None) => {
                    metrics::record_convergence_poll("absent");
                    debug!(kind, key, attempt, "Resource not visible yet");
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    metrics::record_convergence_poll("missed");
                    warn!(
                        kind,
                        key,
                        attempt,
                        phase = ?PollPhase::Failed,
                        error = %e,
                        "Failed to observe status, continuing to poll"
                    );
                }
            }

            if attempt < self.max_attempts {
                wait::wait(self.interval, cancel, "waiting for poll interval").await?;
            }
        }

        phase = PollPhase::TimedOut;
        warn!(kind, key, phase = ?phase, last_status = %last_status, "Resource did not converge");
        Err(Error::ConvergenceTimeout {
            kind,
            key: key.to_string(),
            attempts: self.max_attempts,
            last_status,
        })
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod poller_tests;
