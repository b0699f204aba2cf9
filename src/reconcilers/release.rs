// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Helm release reconciler.
//!
//! The API installs releases with `POST /helm_install` and removes them with
//! `DELETE /deleteapp?Name=<app>`, where the app name is
//! `{cluster namespace}-{release}`. It has no release query, so a release is
//! identified by the composite `cluster:namespace:release` and its presence is
//! inferred from its parent cluster.

use async_trait::async_trait;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{expect_deleted, reject_immutable, require, Reconciler};
use crate::auth::AuthStyle;
use crate::client::{ensure_success, ApiClient};
use crate::constants::{PATH_DELETE_APP, PATH_HELM_INSTALL, QUERY_NAME};
use crate::errors::{Error, Result};
use crate::handle::ResourceHandle;
use crate::identity::{app_name, ReleaseId};
use crate::models::{HelmInstallPayload, ReleaseSpec, ReleaseState};

const KIND: &str = "release";

/// Reconciler for Helm releases.
#[derive(Debug, Clone)]
pub struct ReleaseReconciler {
    client: ApiClient,
}

impl ReleaseReconciler {
    /// Create a Helm release reconciler.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Build the install payload, reading the values file if one is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingField`] for blank required fields and
    /// [`Error::ValuesFile`] when the values file cannot be read.
    pub async fn payload(spec: &ReleaseSpec) -> Result<HelmInstallPayload> {
        require(KIND, "cluster_name", &spec.cluster_name)?;
        require(KIND, "namespace", &spec.namespace)?;
        require(KIND, "release", &spec.release)?;
        require(KIND, "chart", &spec.chart)?;
        require(KIND, "repo", &spec.repo)?;

        let values = match &spec.values_file {
            Some(path) if !path.as_os_str().is_empty() => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| Error::ValuesFile {
                        path: path.clone(),
                        source,
                    })?;
                Some(content)
            }
            _ => spec.values.clone().filter(|values| !values.is_empty()),
        };

        Ok(HelmInstallPayload {
            clustername: spec.cluster_name.clone(),
            namespace: spec.namespace.clone(),
            release: spec.release.clone(),
            chart: spec.chart.clone(),
            repo: spec.repo.clone(),
            version: spec.chart_version.clone().filter(|version| !version.is_empty()),
            values,
        })
    }

    /// Identifier from the handle, else derived from the spec.
    fn release_id(
        handle: &ResourceHandle<ReleaseState>,
        spec: Option<&ReleaseSpec>,
    ) -> Option<Result<ReleaseId>> {
        match (handle.id(), spec) {
            (Some(id), _) => Some(id.parse()),
            (None, Some(spec)) => Some(Ok(ReleaseId::new(
                spec.cluster_name.clone(),
                spec.namespace.clone(),
                spec.release.clone(),
            ))),
            (None, None) => None,
        }
    }

    /// App name used by `/deleteapp`, falling back to the bare release name when
    /// the cluster namespace cannot be resolved.
    async fn resolve_app_name(&self, id: &ReleaseId, cancel: &CancellationToken) -> Result<String> {
        match self.client.fetch_cluster(&id.cluster, cancel).await {
            Ok(Some(info)) if !info.namespace.is_empty() => {
                let name = app_name(&info.namespace, &id.release);
                debug!(app = %name, cluster = %id.cluster, "Resolved app name");
                Ok(name)
            }
            Ok(_) => {
                warn!(cluster = %id.cluster, "Cluster not found or has no namespace, using release name as app name");
                Ok(id.release.clone())
            }
            Err(e) if e.is_cancellation() => Err(e),
            Err(e) => {
                warn!(cluster = %id.cluster, error = %e, "Failed to fetch cluster namespace, using release name as app name");
                Ok(id.release.clone())
            }
        }
    }
}

#[async_trait]
impl Reconciler for ReleaseReconciler {
    type Spec = ReleaseSpec;
    type State = ReleaseState;

    const KIND: &'static str = KIND;

    async fn create(
        &self,
        handle: &mut ResourceHandle<ReleaseState>,
        spec: &ReleaseSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let payload = Self::payload(spec).await?;

        let url = self.client.url(PATH_HELM_INSTALL)?;
        let target = format!("POST {url}");
        let operation = self
            .client
            .request(Method::POST, url, AuthStyle::Bearer)?
            .json(&payload)?
            .build();

        let response = self.client.execute(operation, cancel).await?;
        ensure_success(response, &target).await?.drain().await;

        let id = ReleaseId::new(
            payload.clustername.clone(),
            payload.namespace.clone(),
            payload.release.clone(),
        );
        info!(release = %id.release, cluster = %id.cluster, "Installed Helm release");
        handle.set_id(id.to_string());
        handle.observe(ReleaseState {
            cluster_name: id.cluster,
            namespace: id.namespace,
            release: id.release,
            chart: Some(payload.chart),
            repo: Some(payload.repo),
            chart_version: payload.version,
        });

        self.read(handle, Some(spec), cancel).await
    }

    async fn read(
        &self,
        handle: &mut ResourceHandle<ReleaseState>,
        spec: Option<&ReleaseSpec>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(id) = Self::release_id(handle, spec) else {
            return Ok(());
        };
        let id = id?;

        if self.client.fetch_cluster(&id.cluster, cancel).await?.is_none() {
            info!(cluster = %id.cluster, release = %id.release, "Parent cluster not found, clearing handle");
            handle.clear();
            return Ok(());
        }

        let mut state = handle.state().cloned().unwrap_or_default();
        let same_release = state.cluster_name == id.cluster
            && state.namespace == id.namespace
            && state.release == id.release;
        if !same_release {
            state = ReleaseState::default();
        }
        if let Some(spec) = spec {
            state.chart.get_or_insert_with(|| spec.chart.clone());
            state.repo.get_or_insert_with(|| spec.repo.clone());
            if state.chart_version.is_none() {
                state.chart_version = spec.chart_version.clone();
            }
        }
        handle.set_id(id.to_string());
        state.cluster_name = id.cluster;
        state.namespace = id.namespace;
        state.release = id.release;
        handle.observe(state);
        Ok(())
    }

    async fn update(
        &self,
        handle: &mut ResourceHandle<ReleaseState>,
        previous: &ReleaseSpec,
        desired: &ReleaseSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        reject_immutable(
            KIND,
            &[
                ("cluster_name", previous.cluster_name != desired.cluster_name),
                ("namespace", previous.namespace != desired.namespace),
                ("release", previous.release != desired.release),
                ("chart", previous.chart != desired.chart),
                ("repo", previous.repo != desired.repo),
                ("chart_version", previous.chart_version != desired.chart_version),
            ],
        )?;

        if previous.values != desired.values || previous.values_file != desired.values_file {
            info!(release = %desired.release, "Helm values changed, reinstalling");
            return self.create(handle, desired, cancel).await;
        }
        self.read(handle, Some(desired), cancel).await
    }

    async fn delete(
        &self,
        handle: &mut ResourceHandle<ReleaseState>,
        spec: Option<&ReleaseSpec>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(id) = Self::release_id(handle, spec) else {
            handle.clear();
            return Ok(());
        };
        let id = id?;
        let app = self.resolve_app_name(&id, cancel).await?;

        let url = self
            .client
            .url_with_query(PATH_DELETE_APP, &[(QUERY_NAME, app.as_str())])?;
        let target = format!("DELETE {url}");
        let operation = self
            .client
            .request(Method::DELETE, url, AuthStyle::Bearer)?
            .accept("*/*")
            .build();

        let response = self.client.execute(operation, cancel).await?;
        expect_deleted(response, &target).await?;
        info!(app = %app, cluster = %id.cluster, "Deleted Helm release");

        handle.clear();
        Ok(())
    }
}
