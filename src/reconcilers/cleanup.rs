// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Orphan cleanup batch reconciler.
//!
//! A cleanup batch deletes a caller-supplied list of apps from one cluster. Each
//! app is deleted independently: a failure is recorded and the batch moves on,
//! so the outcome is the set of deleted apps plus an aggregate error naming every
//! failed one. The batch itself has no server-side state.

use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{expect_deleted, reject_immutable, require, Reconciler};
use crate::auth::AuthStyle;
use crate::client::ApiClient;
use crate::constants::{PATH_DELETE_APP, QUERY_NAME};
use crate::errors::{BatchFailure, Error, Result};
use crate::handle::ResourceHandle;
use crate::identity::cleanup_batch_id;
use crate::models::{CleanupSpec, CleanupState};
use crate::wait;

const KIND: &str = "cleanup";

/// Reconciler for orphan cleanup batches.
#[derive(Debug, Clone)]
pub struct CleanupReconciler {
    client: ApiClient,
}

impl CleanupReconciler {
    /// Create an orphan cleanup reconciler.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Non-blank app names, first occurrence wins.
    fn targets(apps: &[String]) -> Vec<&str> {
        let mut seen = HashSet::new();
        apps.iter()
            .map(|app| app.trim())
            .filter(|app| !app.is_empty() && seen.insert(*app))
            .collect()
    }

    async fn delete_app(&self, app: &str, cancel: &CancellationToken) -> Result<()> {
        wait::check(cancel, "orphan cleanup")?;

        let url = self
            .client
            .url_with_query(PATH_DELETE_APP, &[(QUERY_NAME, app)])?;
        let target = format!("DELETE {url}");
        let operation = self
            .client
            .request(Method::DELETE, url, AuthStyle::Bearer)?
            .accept("*/*")
            .build();

        let response = self.client.execute(operation, cancel).await?;
        expect_deleted(response, &target).await
    }
}

#[async_trait]
impl Reconciler for CleanupReconciler {
    type Spec = CleanupSpec;
    type State = CleanupState;

    const KIND: &'static str = KIND;

    async fn create(
        &self,
        handle: &mut ResourceHandle<CleanupState>,
        spec: &CleanupSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require(KIND, "cluster_name", &spec.cluster_name)?;

        if self
            .client
            .fetch_cluster(&spec.cluster_name, cancel)
            .await?
            .is_none()
        {
            return Err(Error::NotFound {
                kind: "cluster",
                key: spec.cluster_name.clone(),
            });
        }

        if !spec.keep_releases.is_empty() {
            warn!(
                cluster = %spec.cluster_name,
                keep = ?spec.keep_releases,
                "keep_releases is recorded only; releases are not listed or diffed against it"
            );
        }

        let mut deleted = Vec::new();
        let mut failures = Vec::new();
        for app in Self::targets(&spec.apps_to_delete) {
            match self.delete_app(app, cancel).await {
                Ok(()) => {
                    info!(app, cluster = %spec.cluster_name, "Deleted orphaned app");
                    deleted.push(app.to_string());
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    error!(app, cluster = %spec.cluster_name, error = %e, "Failed to delete orphaned app");
                    failures.push(BatchFailure {
                        name: app.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        handle.set_id(cleanup_batch_id(&spec.cluster_name));
        handle.observe(CleanupState {
            cluster_name: spec.cluster_name.clone(),
            deleted_apps: deleted.clone(),
            keep_releases: spec.keep_releases.clone(),
        });

        if failures.is_empty() {
            info!(cluster = %spec.cluster_name, deleted = deleted.len(), "Orphan cleanup complete");
            Ok(())
        } else {
            Err(Error::PartialBatch {
                cluster: spec.cluster_name.clone(),
                deleted,
                failures,
            })
        }
    }

    async fn read(
        &self,
        _handle: &mut ResourceHandle<CleanupState>,
        _spec: Option<&CleanupSpec>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    async fn update(
        &self,
        handle: &mut ResourceHandle<CleanupState>,
        previous: &CleanupSpec,
        desired: &CleanupSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        reject_immutable(
            KIND,
            &[("cluster_name", previous.cluster_name != desired.cluster_name)],
        )?;

        if previous.apps_to_delete != desired.apps_to_delete
            || previous.keep_releases != desired.keep_releases
        {
            return self.create(handle, desired, cancel).await;
        }
        debug!(cluster = %desired.cluster_name, "Cleanup batch unchanged");
        Ok(())
    }

    async fn delete(
        &self,
        handle: &mut ResourceHandle<CleanupState>,
        _spec: Option<&CleanupSpec>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        handle.clear();
        Ok(())
    }
}
