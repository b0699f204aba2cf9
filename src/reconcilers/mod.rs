// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lifecycle reconcilers for vcluster resources.
//!
//! Each resource kind implements [`Reconciler`]: the four lifecycle verbs driven
//! through the shared [`ApiClient`](crate::client::ApiClient), with kind-specific
//! identity and mutability policy.
//!
//! # Available Reconcilers
//!
//! | Kind | Identifier | Immutable fields | Delete |
//! |---|---|---|---|
//! | [`ClusterReconciler`] | server-assigned cluster id | name, control plane | 404 is success, ambiguous failures verified |
//! | [`ReleaseReconciler`] | `cluster:namespace:release` | everything but values | 404 is success |
//! | [`SecretReconciler`] | server-assigned id, else name | none | 404 is success, ambiguous failures verified |
//! | [`CleanupReconciler`] | `{cluster}-orphan-cleanup` | cluster | local only |
//!
//! # Example
//!
//! ```rust,no_run
//! use vcluster_engine::config::ProviderConfig;
//! use vcluster_engine::client::ApiClient;
//! use vcluster_engine::handle::ResourceHandle;
//! use vcluster_engine::reconcilers::{Reconciler, SecretReconciler};
//! use vcluster_engine::models::SecretSpec;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn create_secret(config: ProviderConfig, spec: SecretSpec) -> anyhow::Result<()> {
//!     let cancel = CancellationToken::new();
//!     let client = ApiClient::login(&config, &cancel).await?;
//!     let reconciler = SecretReconciler::new(client, config.verifier());
//!
//!     let mut handle = ResourceHandle::new();
//!     reconciler.create(&mut handle, &spec, &cancel).await?;
//!     println!("created secret {:?}", handle.id());
//!     Ok(())
//! }
//! ```

pub mod cleanup;
pub mod cluster;
pub mod release;
pub mod secret;

#[cfg(test)]
mod release_tests;

pub use cleanup::CleanupReconciler;
pub use cluster::ClusterReconciler;
pub use release::ReleaseReconciler;
pub use secret::SecretReconciler;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::errors::{Error, Result};
use crate::handle::ResourceHandle;
use crate::metrics;
use crate::transport::HttpResponse;

/// Lifecycle verbs of a managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
}

impl Verb {
    /// Lowercase name used in logs and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four lifecycle verbs of one resource kind.
///
/// Every verb either leaves `handle` fully populated, clears it (the resource is
/// confirmed gone), or returns an error. Operations on one handle must not run
/// concurrently; distinct handles may.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Desired state supplied by the caller
    type Spec: Send + Sync;
    /// Observed state recorded in the handle
    type State: Send;

    /// Resource kind, used in logs, errors and metrics
    const KIND: &'static str;

    /// Create the resource and record its identifier and state.
    async fn create(
        &self,
        handle: &mut ResourceHandle<Self::State>,
        spec: &Self::Spec,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Refresh the handle from the remote API. An absent resource clears the handle.
    ///
    /// `spec` is `None` when only the identifier is known (e.g. after an import).
    async fn read(
        &self,
        handle: &mut ResourceHandle<Self::State>,
        spec: Option<&Self::Spec>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Move from `previous` to `desired`, rejecting changes to immutable fields.
    async fn update(
        &self,
        handle: &mut ResourceHandle<Self::State>,
        previous: &Self::Spec,
        desired: &Self::Spec,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Delete the resource and clear the handle once removal is confirmed.
    async fn delete(
        &self,
        handle: &mut ResourceHandle<Self::State>,
        spec: Option<&Self::Spec>,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Run one verb, recording its outcome and duration.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] when the verb lacks the specs it needs, and
/// otherwise whatever the reconciler returns.
pub async fn run<R: Reconciler>(
    reconciler: &R,
    verb: Verb,
    handle: &mut ResourceHandle<R::State>,
    desired: Option<&R::Spec>,
    previous: Option<&R::Spec>,
    cancel: &CancellationToken,
) -> Result<()> {
    let start_time = Instant::now();
    let result = match verb {
        Verb::Create => match desired {
            Some(spec) => reconciler.create(handle, spec, cancel).await,
            None => Err(Error::InvalidRequest(format!(
                "{} create requires a manifest",
                R::KIND
            ))),
        },
        Verb::Read => reconciler.read(handle, desired, cancel).await,
        Verb::Update => match (previous, desired) {
            (Some(previous), Some(desired)) => {
                reconciler.update(handle, previous, desired, cancel).await
            }
            _ => Err(Error::InvalidRequest(format!(
                "{} update requires both the previous and the desired manifest",
                R::KIND
            ))),
        },
        Verb::Delete => reconciler.delete(handle, desired, cancel).await,
    };

    let elapsed = start_time.elapsed();
    let outcome = match &result {
        Ok(()) => {
            info!(kind = R::KIND, verb = %verb, duration = ?elapsed, "Operation succeeded");
            "success"
        }
        Err(e) => {
            error!(kind = R::KIND, verb = %verb, duration = ?elapsed, error = %e, "Operation failed");
            e.category()
        }
    };
    metrics::record_operation(R::KIND, verb.as_str(), outcome, elapsed);
    result
}

/// Reject an update that changes any immutable field.
///
/// `changes` pairs each immutable field name with whether it changed.
///
/// # Errors
///
/// Returns [`Error::ImmutableField`] naming every changed field.
pub fn reject_immutable(kind: &'static str, changes: &[(&'static str, bool)]) -> Result<()> {
    let fields: Vec<&'static str> = changes
        .iter()
        .filter(|(_, changed)| *changed)
        .map(|(field, _)| *field)
        .collect();
    if fields.is_empty() {
        Ok(())
    } else {
        Err(Error::ImmutableField { kind, fields })
    }
}

/// Interpret a delete response for kinds without ambiguity verification:
/// 2xx and 404 mean deleted.
///
/// # Errors
///
/// Returns [`Error::Status`] for any other status.
pub async fn expect_deleted(response: HttpResponse, target: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_FOUND {
        response.drain().await;
        Ok(())
    } else {
        Err(response.into_status_error(target).await)
    }
}

/// Require a non-blank field.
///
/// # Errors
///
/// Returns [`Error::MissingField`] if `value` is blank.
pub fn require(kind: &'static str, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::MissingField { kind, field })
    } else {
        Ok(())
    }
}
