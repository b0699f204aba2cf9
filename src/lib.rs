// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # vcluster-engine - Resilient lifecycle engine for vcluster resources
//!
//! Drives clusters, Helm releases, secrets and orphan cleanup batches on a
//! vcluster control-plane API through create, read, update and delete, surviving
//! the failure modes of a slow and flaky remote API.
//!
//! ## Overview
//!
//! - Every request goes through a [`retry::RetryExecutor`] that re-sends transient
//!   failures with exponential backoff and a fresh request body each attempt
//! - Cluster creation waits for the `Healthy` status with a
//!   [`poller::ConvergencePoller`]
//! - Ambiguous delete failures are settled by re-reading the resource with an
//!   [`verifier::AmbiguousFailureVerifier`]
//! - Resources without a server-assigned key use a composite identifier
//!   ([`identity`])
//! - One [`tokio_util::sync::CancellationToken`] interrupts every wait
//!
//! ## Modules
//!
//! - [`reconcilers`] - Lifecycle verbs per resource kind
//! - [`client`] - Authenticated API client shared by all reconcilers
//! - [`retry`] - Retry policy and executor
//! - [`poller`] - Convergence polling
//! - [`verifier`] - Ambiguous delete verification
//! - [`config`] - Provider configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use vcluster_engine::client::ApiClient;
//! use vcluster_engine::config::ProviderConfig;
//! use vcluster_engine::handle::ResourceHandle;
//! use vcluster_engine::models::ClusterSpec;
//! use vcluster_engine::reconcilers::{ClusterReconciler, Reconciler};
//!
//! async fn provision(config: ProviderConfig, spec: ClusterSpec) -> anyhow::Result<()> {
//!     let config = config.validated()?;
//!     let cancel = CancellationToken::new();
//!     let client = ApiClient::login(&config, &cancel).await?;
//!     let clusters = ClusterReconciler::new(client, config.poller(), config.verifier());
//!
//!     let mut handle = ResourceHandle::new();
//!     clusters.create(&mut handle, &spec, &cancel).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod constants;
pub mod errors;
pub mod handle;
pub mod identity;
pub mod metrics;
pub mod models;
pub mod operation;
pub mod poller;
pub mod reconcilers;
pub mod retry;
pub mod transport;
pub mod verifier;
pub mod wait;

#[cfg(test)]
mod test_support;
