// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Virtual cluster reconciler.
//!
//! Cluster provisioning is asynchronous: `POST /createcluster` only accepts the
//! request, and the cluster reports `Progressing` until it becomes `Healthy`.
//! Create therefore hands off to the [`ConvergencePoller`] and only records the
//! cluster id once the cluster has converged.
//!
//! ## Create flow
//!
//! 1. `POST /createcluster` with the raw token
//! 2. Poll `GET /clusters?Name=<name>` until `Healthy`
//! 3. Fetch the kubeconfig from `/connect` and the namespace from the full
//!    cluster list (both best-effort)
//! 4. Record the id (observed `ClusterID`, else the requested one) and read back

use async_trait::async_trait;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{reject_immutable, require, Reconciler};
use crate::auth::AuthStyle;
use crate::client::{ensure_success, ApiClient};
use crate::constants::{
    PATH_CREATE_CLUSTER, PATH_DELETE_CLUSTER, QUERY_NAME, QUERY_NAMESPACE, STATUS_HEALTHY,
};
use crate::errors::{Error, Result};
use crate::handle::ResourceHandle;
use crate::models::{ClusterSpec, ClusterState};
use crate::poller::ConvergencePoller;
use crate::verifier::AmbiguousFailureVerifier;

const KIND: &str = "cluster";

/// Reconciler for virtual clusters.
#[derive(Debug, Clone)]
pub struct ClusterReconciler {
    client: ApiClient,
    poller: ConvergencePoller,
    verifier: AmbiguousFailureVerifier,
}

impl ClusterReconciler {
    /// Create a cluster reconciler that waits for `Healthy` with `poller`.
    #[must_use]
    pub fn new(
        client: ApiClient,
        poller: ConvergencePoller,
        verifier: AmbiguousFailureVerifier,
    ) -> Self {
        Self {
            client,
            poller,
            verifier,
        }
    }

    /// Look up an existing cluster by name (read-only data source).
    ///
    /// # Errors
    ///
    /// - [`Error::MissingField`] for an empty name
    /// - [`Error::NotFound`] when no such cluster exists
    /// - any query error
    pub async fn lookup(&self, name: &str, cancel: &CancellationToken) -> Result<ClusterState> {
        require(KIND, "name", name)?;

        let mut state = self
            .observe(name, cancel)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: KIND,
                key: name.to_string(),
            })?;
        if state.status == STATUS_HEALTHY {
            state.kubeconfig = self.kubeconfig(name, cancel).await?;
        }
        Ok(state)
    }

    /// Current state of the named cluster, `None` if absent.
    async fn observe(&self, name: &str, cancel: &CancellationToken) -> Result<Option<ClusterState>> {
        Ok(self
            .client
            .fetch_cluster(name, cancel)
            .await?
            .map(|info| ClusterState::from(&info)))
    }

    /// Best-effort kubeconfig fetch; only cancellation is an error.
    async fn kubeconfig(&self, name: &str, cancel: &CancellationToken) -> Result<Option<String>> {
        match self.client.fetch_kubeconfig(name, cancel).await {
            Ok(kubeconfig) if !kubeconfig.is_empty() => Ok(Some(kubeconfig)),
            Ok(_) => Ok(None),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                warn!(cluster = name, error = %e, "Failed to fetch kubeconfig");
                Ok(None)
            }
        }
    }

    /// Best-effort namespace lookup through the full cluster list.
    async fn namespace_from_list(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        match self.client.fetch_all_clusters(cancel).await {
            Ok(clusters) => Ok(clusters
                .into_iter()
                .find(|cluster| cluster.name == name && !cluster.namespace.is_empty())
                .map(|cluster| cluster.namespace)),
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                warn!(cluster = name, error = %e, "Failed to fetch cluster list for namespace");
                Ok(None)
            }
        }
    }

    /// Cluster name for read and delete: desired spec, then observed state, then
    /// (import path) a search of the full list by cluster id.
    async fn resolve_name(
        &self,
        handle: &ResourceHandle<ClusterState>,
        spec: Option<&ClusterSpec>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let known = spec
            .map(|spec| spec.name.as_str())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                handle
                    .state()
                    .map(|state| state.name.as_str())
                    .filter(|name| !name.is_empty())
            });
        if let Some(name) = known {
            return Ok(Some(name.to_string()));
        }

        let Some(id) = handle.id() else {
            return Ok(None);
        };
        debug!(cluster_id = id, "Resolving cluster name from id");
        let clusters = self.client.fetch_all_clusters(cancel).await?;
        Ok(clusters
            .into_iter()
            .find(|cluster| cluster.cluster_id == id)
            .map(|cluster| cluster.name))
    }
}

#[async_trait]
impl Reconciler for ClusterReconciler {
    type Spec = ClusterSpec;
    type State = ClusterState;

    const KIND: &'static str = KIND;

    async fn create(
        &self,
        handle: &mut ResourceHandle<ClusterState>,
        spec: &ClusterSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require(KIND, "name", &spec.name)?;
        let name = spec.name.as_str();

        let url = self.client.url(PATH_CREATE_CLUSTER)?;
        let target = format!("POST {url}");
        let operation = self
            .client
            .request(Method::POST, url, AuthStyle::Raw)?
            .json(&spec.to_payload())?
            .build();

        info!(cluster = name, "Creating cluster");
        let response = self.client.execute(operation, cancel).await?;
        ensure_success(response, &target).await?.drain().await;

        let converged = self
            .poller
            .poll_until_converged(KIND, name, handle, || self.observe(name, cancel), cancel)
            .await?;
        info!(cluster = name, attempts = converged.attempts, "Cluster is Healthy");

        let mut state = converged.state;
        state.kubeconfig = self.kubeconfig(name, cancel).await?;
        if let Some(namespace) = self.namespace_from_list(name, cancel).await? {
            info!(cluster = name, namespace = %namespace, "Resolved cluster namespace");
            state.namespace = namespace;
        }

        let id = if state.cluster_id.is_empty() {
            spec.cluster_id.clone()
        } else {
            state.cluster_id.clone()
        };
        handle.set_id(id);
        handle.observe(state);

        self.read(handle, Some(spec), cancel).await
    }

    async fn read(
        &self,
        handle: &mut ResourceHandle<ClusterState>,
        spec: Option<&ClusterSpec>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(name) = self.resolve_name(handle, spec, cancel).await? else {
            debug!("No cluster name known, clearing handle");
            handle.clear();
            return Ok(());
        };

        let Some(info) = self.client.fetch_cluster(&name, cancel).await? else {
            info!(cluster = %name, "Cluster not found, clearing handle");
            handle.clear();
            return Ok(());
        };

        let mut state = handle.state().cloned().unwrap_or_default();
        state.name.clone_from(&name);
        state.refresh(&info);
        if !info.cluster_id.is_empty() {
            handle.set_id(info.cluster_id.clone());
        }
        if info.status == STATUS_HEALTHY {
            if let Some(kubeconfig) = self.kubeconfig(&name, cancel).await? {
                state.kubeconfig = Some(kubeconfig);
            }
        }
        handle.observe(state);
        Ok(())
    }

    async fn update(
        &self,
        handle: &mut ResourceHandle<ClusterState>,
        previous: &ClusterSpec,
        desired: &ClusterSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        reject_immutable(
            KIND,
            &[
                ("name", previous.name != desired.name),
                ("control_plane", previous.control_plane != desired.control_plane),
            ],
        )?;

        if previous == desired {
            return self.read(handle, Some(desired), cancel).await;
        }
        info!(cluster = %desired.name, "Cluster attributes changed, re-submitting create");
        self.create(handle, desired, cancel).await
    }

    async fn delete(
        &self,
        handle: &mut ResourceHandle<ClusterState>,
        spec: Option<&ClusterSpec>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(name) = self.resolve_name(handle, spec, cancel).await? else {
            debug!("No cluster name known, nothing to delete");
            handle.clear();
            return Ok(());
        };

        let mut namespace = handle
            .state()
            .map(|state| state.namespace.clone())
            .unwrap_or_default();
        if namespace.is_empty() {
            match self.client.fetch_cluster(&name, cancel).await {
                Ok(Some(info)) => namespace = info.namespace,
                Ok(None) => {}
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => warn!(cluster = %name, error = %e, "Failed to fetch cluster namespace for delete"),
            }
        }

        let mut query = vec![(QUERY_NAME, name.as_str())];
        if namespace.is_empty() {
            warn!(cluster = %name, "Deleting cluster without namespace");
        } else {
            query.push((QUERY_NAMESPACE, namespace.as_str()));
        }
        let url = self.client.url_with_query(PATH_DELETE_CLUSTER, &query)?;
        let target = format!("DELETE {url}");
        let operation = self
            .client
            .request(Method::DELETE, url, AuthStyle::Raw)?
            .accept("application/json")
            .build();

        info!(cluster = %name, "Deleting cluster");
        let outcome = self.client.execute(operation, cancel).await;
        self.verifier
            .resolve_delete(KIND, &name, &target, outcome, || self.observe(&name, cancel), cancel)
            .await?;

        handle.clear();
        Ok(())
    }
}
