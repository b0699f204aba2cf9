// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire payloads of the vcluster API and the declarative specs of each resource kind.
//!
//! Wire types mirror the remote JSON field names exactly (`Name`, `ClusterID`,
//! `NameSpace`, `createdAt`, ...). Spec types are what callers hand to a
//! reconciler; state types are what a reconciler records in a
//! [`ResourceHandle`](crate::handle::ResourceHandle).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::constants::STATUS_PROGRESSING;
use crate::poller::LifecycleStatus;

// ============================================================================
// Login
// ============================================================================

/// Body of `POST /login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response of `POST /login`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: String,
}

// ============================================================================
// Cluster
// ============================================================================

/// Body of `POST /createcluster`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterPayload {
    pub name: String,
    #[serde(rename = "ClusterID")]
    pub cluster_id: String,
    pub control_plane: String,
    pub status: String,
    pub cpu: String,
    pub memory: String,
    pub platform_version: String,
    pub health_check: String,
    pub alert: String,
    pub end_point: String,
    pub cluster_type: String,
    #[serde(rename = "CoreDNSCpu")]
    pub coredns_cpu: String,
    #[serde(rename = "CoreDNSMemory")]
    pub coredns_memory: String,
    pub api_server_cpu: String,
    pub api_server_memory: String,
}

/// One element of the `GET /clusters` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterInfo {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ClusterID")]
    pub cluster_id: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "HealthCheck")]
    pub health_check: String,
    #[serde(rename = "Alert")]
    pub alert: String,
    #[serde(rename = "EndPoint")]
    pub endpoint: String,
    #[serde(rename = "NameSpace")]
    pub namespace: String,
}

fn default_cluster_status() -> String {
    STATUS_PROGRESSING.to_string()
}

/// Desired state of a virtual cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub cluster_id: String,
    pub control_plane: String,
    #[serde(default = "default_cluster_status")]
    pub status: String,
    pub cpu: String,
    pub memory: String,
    pub platform_version: String,
    #[serde(default)]
    pub health_check: String,
    #[serde(default)]
    pub alert: String,
    #[serde(default)]
    pub endpoint: String,
    pub cluster_type: String,
    pub coredns_cpu: String,
    pub coredns_memory: String,
    pub apiserver_cpu: String,
    pub apiserver_memory: String,
}

impl ClusterSpec {
    /// Build the create payload.
    #[must_use]
    pub fn to_payload(&self) -> ClusterPayload {
        ClusterPayload {
            name: self.name.clone(),
            cluster_id: self.cluster_id.clone(),
            control_plane: self.control_plane.clone(),
            status: self.status.clone(),
            cpu: self.cpu.clone(),
            memory: self.memory.clone(),
            platform_version: self.platform_version.clone(),
            health_check: self.health_check.clone(),
            alert: self.alert.clone(),
            end_point: self.endpoint.clone(),
            cluster_type: self.cluster_type.clone(),
            coredns_cpu: self.coredns_cpu.clone(),
            coredns_memory: self.coredns_memory.clone(),
            api_server_cpu: self.apiserver_cpu.clone(),
            api_server_memory: self.apiserver_memory.clone(),
        }
    }
}

/// Observed state of a virtual cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    pub name: String,
    pub cluster_id: String,
    pub status: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
}

impl From<&ClusterInfo> for ClusterState {
    fn from(info: &ClusterInfo) -> Self {
        Self {
            name: info.name.clone(),
            cluster_id: info.cluster_id.clone(),
            status: info.status.clone(),
            endpoint: info.endpoint.clone(),
            namespace: info.namespace.clone(),
            version: info.version.clone(),
            kubeconfig: None,
        }
    }
}

impl ClusterState {
    /// Refresh observed attributes from a new snapshot.
    ///
    /// Empty values in the snapshot do not erase what is already known, and the
    /// kubeconfig is kept.
    pub fn refresh(&mut self, info: &ClusterInfo) {
        self.status.clone_from(&info.status);
        self.endpoint.clone_from(&info.endpoint);
        if !info.name.is_empty() {
            self.name.clone_from(&info.name);
        }
        if !info.namespace.is_empty() {
            self.namespace.clone_from(&info.namespace);
        }
        if !info.cluster_id.is_empty() {
            self.cluster_id.clone_from(&info.cluster_id);
        }
        if !info.version.is_empty() {
            self.version.clone_from(&info.version);
        }
    }
}

impl LifecycleStatus for ClusterState {
    fn lifecycle_status(&self) -> &str {
        &self.status
    }
}

// ============================================================================
// Helm release
// ============================================================================

/// Body of `POST /helm_install`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HelmInstallPayload {
    pub clustername: String,
    pub namespace: String,
    pub release: String,
    pub chart: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
}

/// Desired state of a Helm release inside a virtual cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    pub cluster_name: String,
    pub namespace: String,
    pub release: String,
    pub chart: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_version: Option<String>,
    /// Inline Helm values (YAML)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
    /// Path of a Helm values file; takes precedence over `values`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_file: Option<PathBuf>,
}

/// Observed state of a Helm release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReleaseState {
    pub cluster_name: String,
    pub namespace: String,
    pub release: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_version: Option<String>,
}

// ============================================================================
// Secret
// ============================================================================

/// Body of secret create and update calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data: BTreeMap<String, String>,
}

/// A secret as returned by the secrets API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SecretInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub data: BTreeMap<String, String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Response of `GET /secrets/api/v1/secrets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretsListResponse {
    pub secrets: Vec<SecretInfo>,
}

/// Desired state of a secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl SecretSpec {
    /// Build the create/update payload. An empty description is omitted.
    #[must_use]
    pub fn to_payload(&self) -> SecretPayload {
        SecretPayload {
            name: self.name.clone(),
            description: self.description.clone().filter(|d| !d.is_empty()),
            data: self.data.clone(),
        }
    }
}

/// Observed state of a secret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretState {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl From<SecretInfo> for SecretState {
    fn from(info: SecretInfo) -> Self {
        Self {
            id: info.id,
            name: info.name,
            description: info.description,
            data: info.data,
            created_at: info.created_at,
            updated_at: info.updated_at,
        }
    }
}

// ============================================================================
// Orphan cleanup
// ============================================================================

/// A batch of orphaned apps to remove from a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupSpec {
    pub cluster_name: String,
    #[serde(default)]
    pub apps_to_delete: Vec<String>,
    /// Releases to keep; recorded only, no list-and-diff is performed
    #[serde(default)]
    pub keep_releases: Vec<String>,
}

/// Outcome of a cleanup batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupState {
    pub cluster_name: String,
    #[serde(default)]
    pub deleted_apps: Vec<String>,
    #[serde(default)]
    pub keep_releases: Vec<String>,
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod models_tests;
