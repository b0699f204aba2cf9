// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `models.rs`

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::models::*;

    fn cluster_spec() -> ClusterSpec {
        serde_yaml::from_str(
            r"
name: c1
cluster_id: id-1
control_plane: k8s
cpu: '2'
memory: 4Gi
platform_version: v1.30
cluster_type: Shared
coredns_cpu: 100m
coredns_memory: 128Mi
apiserver_cpu: 500m
apiserver_memory: 1Gi
",
        )
        .unwrap()
    }

    #[test]
    fn test_cluster_spec_defaults_status_to_progressing() {
        let spec = cluster_spec();
        assert_eq!(spec.status, "Progressing");
        assert_eq!(spec.health_check, "");
    }

    #[test]
    fn test_cluster_payload_uses_api_field_names() {
        let value = serde_json::to_value(cluster_spec().to_payload()).unwrap();
        assert_eq!(value["Name"], "c1");
        assert_eq!(value["ClusterID"], "id-1");
        assert_eq!(value["ControlPlane"], "k8s");
        assert_eq!(value["PlatformVersion"], "v1.30");
        assert_eq!(value["EndPoint"], "");
        assert_eq!(value["CoreDNSCpu"], "100m");
        assert_eq!(value["CoreDNSMemory"], "128Mi");
        assert_eq!(value["ApiServerCpu"], "500m");
        assert_eq!(value["ApiServerMemory"], "1Gi");
        assert_eq!(value.as_object().unwrap().len(), 15);
    }

    #[test]
    fn test_cluster_info_tolerates_missing_fields() {
        let info: ClusterInfo =
            serde_json::from_value(json!({"Name": "c1", "Status": "Healthy", "NameSpace": "ns-1"}))
                .unwrap();
        assert_eq!(info.namespace, "ns-1");
        assert_eq!(info.cluster_id, "");
    }

    #[test]
    fn test_cluster_state_refresh_keeps_known_values() {
        let mut state = ClusterState {
            name: "c1".to_string(),
            cluster_id: "id-1".to_string(),
            namespace: "ns-1".to_string(),
            kubeconfig: Some("apiVersion: v1".to_string()),
            ..ClusterState::default()
        };
        state.refresh(&ClusterInfo {
            status: "Healthy".to_string(),
            ..ClusterInfo::default()
        });
        assert_eq!(state.status, "Healthy");
        assert_eq!(state.cluster_id, "id-1");
        assert_eq!(state.namespace, "ns-1");
        assert!(state.kubeconfig.is_some());
    }

    #[test]
    fn test_helm_payload_omits_absent_version_and_values() {
        let payload = HelmInstallPayload {
            clustername: "prod".to_string(),
            namespace: "ns1".to_string(),
            release: "mysql".to_string(),
            chart: "bitnami/mysql".to_string(),
            repo: "https://charts.bitnami.com/bitnami".to_string(),
            version: None,
            values: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "Clustername": "prod",
                "Namespace": "ns1",
                "Release": "mysql",
                "Chart": "bitnami/mysql",
                "Repo": "https://charts.bitnami.com/bitnami",
            })
        );
    }

    #[test]
    fn test_secret_info_uses_camel_case_timestamps() {
        let info: SecretInfo = serde_json::from_value(json!({
            "id": "s-1",
            "name": "db",
            "data": {"user": "admin"},
            "createdAt": "2025-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(info.created_at, "2025-01-01T00:00:00Z");
        assert_eq!(info.updated_at, "");

        let state = SecretState::from(info);
        assert_eq!(state.data.get("user").map(String::as_str), Some("admin"));
    }

    #[test]
    fn test_secret_payload_omits_empty_description() {
        let spec = SecretSpec {
            name: "db".to_string(),
            description: Some(String::new()),
            data: [("k".to_string(), "v".to_string())].into_iter().collect(),
        };
        let value = serde_json::to_value(spec.to_payload()).unwrap();
        assert!(value.get("description").is_none());
        assert_eq!(value["data"]["k"], "v");
    }
}
