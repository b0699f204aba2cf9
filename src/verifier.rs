// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resolution of ambiguous delete outcomes.
//!
//! Some deletes report failure (a connection closed mid-response, a 5xx) even though
//! the resource was removed. After such an outcome the verifier waits a short grace
//! interval, looks the resource up once, and decides:
//!
//! | Lookup result   | Outcome                                   |
//! |-----------------|-------------------------------------------|
//! | absent          | success, the original error is suppressed |
//! | present         | the original error is surfaced            |
//! | lookup failed   | the original error is surfaced            |
//!
//! Deletion is never claimed without positive evidence of absence.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::DEFAULT_VERIFY_GRACE_SECS;
use crate::errors::{Error, Result};
use crate::metrics;
use crate::transport::HttpResponse;
use crate::wait;

/// Result of a single verification lookup.
#[derive(Debug)]
pub enum Verification<T> {
    /// The resource is gone
    ConfirmedDeleted,
    /// The resource still exists
    ConfirmedPresent(T),
    /// The lookup itself failed; nothing is known
    Inconclusive(Error),
}

impl<T> Verification<T> {
    fn label(&self) -> &'static str {
        match self {
            Verification::ConfirmedDeleted => "confirmed_deleted",
            Verification::ConfirmedPresent(_) => "confirmed_present",
            Verification::Inconclusive(_) => "inconclusive",
        }
    }
}

/// Verifies deletes whose outcome is ambiguous.
#[derive(Debug, Clone)]
pub struct AmbiguousFailureVerifier {
    grace: Duration,
}

impl Default for AmbiguousFailureVerifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_VERIFY_GRACE_SECS))
    }
}

impl AmbiguousFailureVerifier {
    /// Create a verifier that waits `grace` before looking the resource up.
    #[must_use]
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Grace interval before the verification lookup.
    #[must_use]
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Wait the grace interval, then look the resource up once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires during the grace interval or
    /// the lookup. Lookup failures are reported as [`Verification::Inconclusive`].
    pub async fn verify<T, F, Fut>(
        &self,
        kind: &'static str,
        key: &str,
        lookup: F,
        cancel: &CancellationToken,
    ) -> Result<Verification<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        wait::wait(self.grace, cancel, "waiting to verify delete").await?;

        let looked_up = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled { during: "verifying delete" }),
            looked_up = lookup() => looked_up,
        };

        let verification = match looked_up {
            Ok(None) => Verification::ConfirmedDeleted,
            Ok(Some(found)) => Verification::ConfirmedPresent(found),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => Verification::Inconclusive(e),
        };
        metrics::record_delete_verification(verification.label());
        debug!(kind, key, outcome = verification.label(), "Delete verification finished");
        Ok(verification)
    }

    /// Interpret the outcome of a delete request.
    ///
    /// 2xx and 404 are success without any extra round-trip. Every other outcome,
    /// including a network failure, is ambiguous and resolved by [`Self::verify`].
    /// `target` names the request in status errors.
    ///
    /// # Errors
    ///
    /// Returns the original delete error unless verification confirms the resource
    /// is absent, or [`Error::Cancelled`] if the operation is cancelled.
    pub async fn resolve_delete<T, F, Fut>(
        &self,
        kind: &'static str,
        key: &str,
        target: &str,
        outcome: Result<HttpResponse>,
        lookup: F,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let original = match outcome {
            Ok(response) if response.status().is_success() => {
                response.drain().await;
                debug!(kind, key, "Delete accepted");
                return Ok(());
            }
            Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                response.drain().await;
                info!(kind, key, "Resource not found, treating as already deleted");
                return Ok(());
            }
            Ok(response) => response.into_status_error(target).await,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => e,
        };

        warn!(kind, key, error = %original, "Delete outcome is ambiguous, verifying");

        match self.verify(kind, key, lookup, cancel).await? {
            Verification::ConfirmedDeleted => {
                info!(kind, key, suppressed = %original, "Resource deleted (verified)");
                Ok(())
            }
            Verification::ConfirmedPresent(_) => {
                warn!(kind, key, "Resource still present after failed delete");
                Err(original)
            }
            Verification::Inconclusive(lookup_error) => {
                warn!(kind, key, error = %lookup_error, "Failed to verify delete");
                Err(original)
            }
        }
    }
}

#[cfg(test)]
#[path = "verifier_tests.rs"]
mod verifier_tests;
